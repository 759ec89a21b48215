//! SD card bring-up check: mount a FAT filesystem over SPI, run the basic
//! write/rename/read cycle, unmount, release the bus.

#![no_std]
#![no_main]

use boardcheck::{config, sdfs};
use embassy_time::Timer;
use embedded_hal_bus::spi::ExclusiveDevice;
use embedded_sdmmc::SdCard;
use esp_backtrace as _;
use esp_hal::{
    delay::Delay,
    gpio::{Level, Output, OutputConfig},
    spi::{
        master::{Config as SpiConfig, Spi},
        Mode as SpiMode,
    },
    time::Rate,
    timer::timg::TimerGroup,
    Blocking,
};
use esp_println::println;

#[esp_hal::main]
fn main() -> ! {
    let peripherals = esp_hal::init(esp_hal::Config::default());
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    let spi_cfg = SpiConfig::default()
        .with_frequency(Rate::from_khz(config::SD_SPI_FREQ_KHZ))
        .with_mode(SpiMode::_0);
    let spi = Spi::new(peripherals.SPI2, spi_cfg)
        .expect("failed to init SPI2 for the SD card")
        .with_sck(peripherals.GPIO14)
        .with_mosi(peripherals.GPIO13)
        .with_miso(peripherals.GPIO12);
    let cs = Output::new(peripherals.GPIO15, Level::High, OutputConfig::default());

    let mut executor = esp_rtos::embassy::Executor::new();
    let executor = unsafe { make_static(&mut executor) };
    executor.run(move |spawner| {
        spawner.must_spawn(sd_card_task(spi, cs));
    });
}

#[embassy_executor::task]
async fn sd_card_task(spi: Spi<'static, Blocking>, cs: Output<'static>) {
    run_check(spi, cs);

    // The check is one-shot; park here whatever the outcome.
    loop {
        Timer::after_secs(60).await;
    }
}

/// The linear check sequence. Every step fails fast: log, return, leave the
/// remaining steps unrun.
fn run_check(spi: Spi<'static, Blocking>, cs: Output<'static>) {
    println!("sdcard: initializing SD card over SPI");
    let Ok(spi_device) = ExclusiveDevice::new(spi, cs, Delay::new()) else {
        println!("sdcard: failed to assert the card chip-select line");
        return;
    };
    let card = SdCard::new(spi_device, Delay::new());

    println!("sdcard: mounting filesystem");
    let mut volume = match sdfs::mount(card, &config::MOUNT) {
        Ok(volume) => volume,
        Err(err) => {
            println!("sdcard: mount failed: {:?}", err);
            println!("sdcard: {}", err.hint(&config::MOUNT));
            return;
        }
    };
    println!("sdcard: filesystem mounted");

    let info = match sdfs::card_info(volume.device()) {
        Ok(info) => info,
        Err(err) => {
            println!("sdcard: failed to read card info: {:?}", err);
            return;
        }
    };
    println!(
        "sdcard: card type {}, capacity {} MiB",
        info.type_label(),
        info.capacity_mib()
    );

    let line = sdfs::greeting(info.type_label());
    println!("sdcard: opening file {}", config::FILE_HELLO);
    if let Err(err) = volume.write_line(config::FILE_HELLO, line.as_str()) {
        println!("sdcard: failed to open file for writing: {:?}", err);
        return;
    }
    println!("sdcard: file written");

    // A destination left over from an earlier run would make the rename
    // refuse; clear it first.
    match volume.exists(config::FILE_FOO) {
        Ok(true) => {
            if let Err(err) = volume.remove(config::FILE_FOO) {
                println!(
                    "sdcard: failed to delete stale {}: {:?}",
                    config::FILE_FOO,
                    err
                );
                return;
            }
        }
        Ok(false) => {}
        Err(err) => {
            println!("sdcard: failed to scan the root directory: {:?}", err);
            return;
        }
    }

    println!(
        "sdcard: renaming file {} to {}",
        config::FILE_HELLO,
        config::FILE_FOO
    );
    if let Err(err) = volume.rename(config::FILE_HELLO, config::FILE_FOO) {
        println!("sdcard: rename failed: {:?}", err);
        return;
    }

    println!("sdcard: reading file {}", config::FILE_FOO);
    let mut buf = [0u8; config::LINE_MAX];
    match volume.read_first_line(config::FILE_FOO, &mut buf) {
        Ok(read_back) => println!("sdcard: read from file: '{}'", read_back),
        Err(err) => {
            println!("sdcard: failed to open file for reading: {:?}", err);
            return;
        }
    }

    match volume.unmount() {
        // Dropping the returned card releases the SPI bus and chip-select.
        Ok(_card) => println!("sdcard: card unmounted"),
        Err(err) => println!("sdcard: unmount failed: {:?}", err),
    }
}

unsafe fn make_static<T>(value: &mut T) -> &'static mut T {
    unsafe { core::mem::transmute(value) }
}
