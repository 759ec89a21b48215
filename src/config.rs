//! Compile-time settings shared by the check binaries.

use crate::sdfs::MountConfig;

/// The SD card is driven at its initialization rate for the whole session;
/// the checks move a handful of bytes, so there is nothing to gain from
/// renegotiating a faster clock afterwards.
pub const SD_SPI_FREQ_KHZ: u32 = 400;

/// Directory handle capacity compiled into the volume manager.
pub const SD_DIR_HANDLES: usize = 4;
/// File handle capacity compiled into the volume manager. The mount
/// configuration's `max_open_files` must fit inside this.
pub const SD_FILE_HANDLES: usize = 8;

pub const MOUNT: MountConfig = MountConfig {
    format_if_mount_failed: false,
    max_open_files: 5,
    allocation_unit_kib: 16,
};

pub const FILE_HELLO: &str = "HELLO.TXT";
pub const FILE_FOO: &str = "FOO.TXT";

/// Longest line the read-back step will consume, terminator included.
pub const LINE_MAX: usize = 64;

pub const COUNTDOWN_START_SECONDS: u32 = 10;

pub const GPIO_TEST_CYCLES: u32 = 16;
