// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

use std::{sync::OnceLock, time::Instant};

use klogger::{LoggerAdapter, Origin};

use crate::machine::try_current;

struct LoggerAdapterImpl;

#[crate_interface::impl_interface]
impl LoggerAdapter for LoggerAdapterImpl {
    fn write_str(s: &str) {
        print!("{s}");
    }

    fn now() -> core::time::Duration {
        static HOST_EPOCH: OnceLock<Instant> = OnceLock::new();
        match try_current() {
            Some(cpu) => cpu.machine.uptime(),
            None => HOST_EPOCH.get_or_init(Instant::now).elapsed(),
        }
    }

    fn origin() -> Option<Origin> {
        try_current().map(|cpu| Origin {
            cpu: 0,
            context: cpu.context_id,
        })
    }
}
