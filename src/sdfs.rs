//! SD card filesystem plumbing for the checks.
//!
//! The SD/SPI protocol and the FAT implementation live in `embedded-sdmmc`;
//! this module only adapts its raw-handle API to the linear flow the
//! `sd_card` check runs: mount once, a handful of root-directory file
//! operations, unmount.

use core::fmt::Write;

use embedded_hal::{delay::DelayNs, spi::SpiDevice};
use embedded_sdmmc::{
    sdcard::CardType, BlockDevice, Error as FsError, Mode, RawDirectory, RawFile, RawVolume,
    SdCard, ShortFileName, TimeSource, Timestamp, VolumeIdx, VolumeManager,
};

use crate::config::{SD_DIR_HANDLES, SD_FILE_HANDLES};

/// Mount options, passed by value to [`mount`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MountConfig {
    /// The driver cannot format a card in place; when set, the mount-failure
    /// hint says so instead of suggesting the option.
    pub format_if_mount_failed: bool,
    pub max_open_files: u8,
    /// Allocation unit to use when the card is (re)formatted on a host.
    pub allocation_unit_kib: u32,
}

impl MountConfig {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.max_open_files == 0 {
            return Err("max_open_files must be at least 1");
        }
        if self.max_open_files as usize > SD_FILE_HANDLES {
            return Err("max_open_files exceeds the compiled file handle capacity");
        }
        Ok(())
    }
}

/// Why a mount attempt failed. `Card` means the card never answered sanely
/// on the bus; `Filesystem` means the card is alive but volume 0 could not
/// be opened as FAT.
#[derive(Debug)]
pub enum MountError<E>
where
    E: core::fmt::Debug,
{
    Config(&'static str),
    Card(FsError<E>),
    Filesystem(FsError<E>),
}

impl<E> MountError<E>
where
    E: core::fmt::Debug,
{
    /// Operator-facing recovery hint for this failure class.
    pub fn hint(&self, cfg: &MountConfig) -> heapless::String<128> {
        let mut hint = heapless::String::new();
        let _ = match self {
            MountError::Config(reason) => write!(hint, "fix the mount configuration: {reason}"),
            MountError::Card(_) => write!(
                hint,
                "make sure the SD card lines have pull-up resistors in place"
            ),
            MountError::Filesystem(_) if cfg.format_if_mount_failed => write!(
                hint,
                "this driver cannot format in place; reformat the card on a host (FAT, {} KiB allocation units)",
                cfg.allocation_unit_kib
            ),
            MountError::Filesystem(_) => write!(
                hint,
                "if you want the card formatted, reformat it on a host (FAT, {} KiB allocation units)",
                cfg.allocation_unit_kib
            ),
        };
        hint
    }
}

fn classify<E>(err: FsError<E>) -> MountError<E>
where
    E: core::fmt::Debug,
{
    match err {
        FsError::DeviceError(_) => MountError::Card(err),
        _ => MountError::Filesystem(err),
    }
}

/// Static card metadata, read once after the card has been brought up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CardInfo {
    pub card_type: Option<CardType>,
    pub capacity_bytes: u64,
}

impl CardInfo {
    /// Label the driver reports for the card. Stands in for the CID product
    /// name, which the driver does not expose.
    pub fn type_label(&self) -> &'static str {
        match self.card_type {
            Some(CardType::SD1) => "SD1",
            Some(CardType::SD2) => "SD2",
            Some(CardType::SDHC) => "SDHC",
            None => "unknown",
        }
    }

    pub fn capacity_mib(&self) -> u64 {
        self.capacity_bytes / (1024 * 1024)
    }
}

pub fn card_info<S, D>(card: &SdCard<S, D>) -> Result<CardInfo, embedded_sdmmc::sdcard::Error>
where
    S: SpiDevice<u8>,
    D: DelayNs,
{
    let capacity_bytes = card.num_bytes()?;
    Ok(CardInfo {
        card_type: card.get_card_type(),
        capacity_bytes,
    })
}

/// The checks do not track wall-clock time; every directory entry gets the
/// FAT epoch.
#[derive(Default)]
pub struct SdTimeSource;

impl TimeSource for SdTimeSource {
    fn get_timestamp(&self) -> Timestamp {
        Timestamp {
            year_since_1970: 0,
            zero_indexed_month: 0,
            zero_indexed_day: 0,
            hours: 0,
            minutes: 0,
            seconds: 0,
        }
    }
}

type Manager<D> = VolumeManager<D, SdTimeSource, SD_DIR_HANDLES, SD_FILE_HANDLES, 1>;

/// A mounted card: the volume manager plus open handles for volume 0 and
/// its root directory. Consumed by [`SdVolume::unmount`], so a handle
/// cannot be used after the card is released.
pub struct SdVolume<D>
where
    D: BlockDevice,
{
    mgr: Manager<D>,
    volume: RawVolume,
    root: RawDirectory,
}

pub fn mount<D>(device: D, cfg: &MountConfig) -> Result<SdVolume<D>, MountError<D::Error>>
where
    D: BlockDevice,
{
    cfg.validate().map_err(MountError::Config)?;

    let mut mgr: Manager<D> = VolumeManager::new_with_limits(device, SdTimeSource, 0x1000);
    let volume = mgr.open_raw_volume(VolumeIdx(0)).map_err(classify)?;
    let root = match mgr.open_root_dir(volume) {
        Ok(root) => root,
        Err(err) => {
            let _ = mgr.close_volume(volume);
            return Err(classify(err));
        }
    };

    Ok(SdVolume { mgr, volume, root })
}

impl<D> SdVolume<D>
where
    D: BlockDevice,
{
    pub fn device(&mut self) -> &mut D {
        self.mgr.device()
    }

    /// Create-or-truncate `name` in the root directory and write `line`.
    pub fn write_line(&mut self, name: &str, line: &str) -> Result<(), FsError<D::Error>> {
        let file = self
            .mgr
            .open_file_in_dir(self.root, name, Mode::ReadWriteCreateOrTruncate)?;
        let written = self.mgr.write(file, line.as_bytes());
        let closed = self.mgr.close_file(file);
        written?;
        closed
    }

    pub fn exists(&mut self, name: &str) -> Result<bool, FsError<D::Error>> {
        let target = ShortFileName::create_from_str(name).map_err(FsError::FilenameError)?;
        let mut found = false;
        self.mgr.iterate_dir(self.root, |entry| {
            if entry.name == target {
                found = true;
            }
        })?;
        Ok(found)
    }

    pub fn remove(&mut self, name: &str) -> Result<(), FsError<D::Error>> {
        self.mgr.delete_file_in_dir(self.root, name)
    }

    /// Move `src` onto `dst`. The driver has no in-place rename, so this is
    /// copy-then-delete; it refuses to clobber an existing `dst`.
    pub fn rename(&mut self, src: &str, dst: &str) -> Result<(), FsError<D::Error>> {
        if self.exists(dst)? {
            return Err(FsError::FileAlreadyExists);
        }

        let from = self.mgr.open_file_in_dir(self.root, src, Mode::ReadOnly)?;
        let to = match self
            .mgr
            .open_file_in_dir(self.root, dst, Mode::ReadWriteCreate)
        {
            Ok(to) => to,
            Err(err) => {
                let _ = self.mgr.close_file(from);
                return Err(err);
            }
        };

        let copied = self.copy_contents(from, to);
        let from_closed = self.mgr.close_file(from);
        let to_closed = self.mgr.close_file(to);
        copied?;
        from_closed?;
        to_closed?;

        self.mgr.delete_file_in_dir(self.root, src)
    }

    fn copy_contents(&mut self, from: RawFile, to: RawFile) -> Result<(), FsError<D::Error>> {
        let mut chunk = [0u8; 64];
        while !self.mgr.file_eof(from)? {
            let n = self.mgr.read(from, &mut chunk)?;
            if n == 0 {
                break;
            }
            self.mgr.write(to, &chunk[..n])?;
        }
        Ok(())
    }

    /// Read the first line of `name` into `buf`, line terminator stripped.
    pub fn read_first_line<'b>(
        &mut self,
        name: &str,
        buf: &'b mut [u8],
    ) -> Result<&'b str, FsError<D::Error>> {
        let file = self.mgr.open_file_in_dir(self.root, name, Mode::ReadOnly)?;
        let read = self.mgr.read(file, buf);
        let closed = self.mgr.close_file(file);
        let len = read?;
        closed?;

        let line = core::str::from_utf8(first_line(&buf[..len]))
            .map_err(|_| FsError::FormatError("file is not valid utf-8"))?;
        Ok(strip_line_ending(line))
    }

    /// Close the root directory and the volume, then hand the block device
    /// back so the caller can release the bus.
    pub fn unmount(mut self) -> Result<D, FsError<D::Error>> {
        self.mgr.close_dir(self.root)?;
        self.mgr.close_volume(self.volume)?;
        let (device, _time_source) = self.mgr.free();
        Ok(device)
    }
}

/// First line of a byte buffer, the `\n` excluded.
pub fn first_line(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|&b| b == b'\n') {
        Some(idx) => &bytes[..idx],
        None => bytes,
    }
}

/// Strip one trailing `\n`, `\r\n` or `\r`.
pub fn strip_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// The one line the check writes to the card.
pub fn greeting(card_name: &str) -> heapless::String<64> {
    let mut line = heapless::String::new();
    let _ = writeln!(line, "Hello {card_name}!");
    line
}
