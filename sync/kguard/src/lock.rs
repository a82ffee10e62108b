// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

use core::{
    marker::PhantomData,
    mem::ManuallyDrop,
    ops::{Deref, DerefMut},
};

use crate::guard::BaseGuard;

/// A spinlock that holds guard `G` while it is locked.
pub struct BaseSpinLock<G: BaseGuard, T: ?Sized> {
    _guard: PhantomData<G>,
    inner: spin::Mutex<T>,
}

/// Scoped lock of a [`BaseSpinLock`].
///
/// The lock is released first, then the guard state is restored.
pub struct BaseSpinLockGuard<'a, G: BaseGuard, T: ?Sized + 'a> {
    state: G::State,
    inner: ManuallyDrop<spin::MutexGuard<'a, T>>,
}

impl<G: BaseGuard, T> BaseSpinLock<G, T> {
    /// Creates an unlocked lock around `data`.
    pub const fn new(data: T) -> Self {
        Self {
            _guard: PhantomData,
            inner: spin::Mutex::new(data),
        }
    }
}

impl<G: BaseGuard, T: ?Sized> BaseSpinLock<G, T> {
    /// Enters the guard and spins until the lock is acquired.
    pub fn lock(&self) -> BaseSpinLockGuard<'_, G, T> {
        let state = G::acquire();
        BaseSpinLockGuard {
            state,
            inner: ManuallyDrop::new(self.inner.lock()),
        }
    }
}

impl<G: BaseGuard, T: ?Sized> Deref for BaseSpinLockGuard<'_, G, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<G: BaseGuard, T: ?Sized> DerefMut for BaseSpinLockGuard<'_, G, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

impl<G: BaseGuard, T: ?Sized> Drop for BaseSpinLockGuard<'_, G, T> {
    fn drop(&mut self) {
        // SAFETY: `inner` is dropped exactly once, here.
        unsafe { ManuallyDrop::drop(&mut self.inner) };
        G::release(self.state);
    }
}
