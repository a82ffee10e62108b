// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Machine console.

use core::fmt;

use crate::machine::with_current;

/// Prints to the console of the current machine.
#[macro_export]
macro_rules! console {
    ($($arg:tt)*) => {
        $crate::console_fmt(format_args!($($arg)*))
    };
}

/// Prints to the console of the current machine, with a newline.
#[macro_export]
macro_rules! consoleln {
    () => { $crate::console!("\n") };
    ($($arg:tt)*) => {
        $crate::console_fmt(format_args!("{}\n", format_args!($($arg)*)))
    };
}

#[doc(hidden)]
pub fn console_fmt(args: fmt::Arguments) {
    with_current(|m| m.write_console(args));
}
