//! Chip bring-up check: print chip identification, exercise the GPIO
//! loopback helper, count down, restart.

#![no_std]
#![no_main]

use boardcheck::{chip::ChipInfo, config, gpiotest::GpioTest};
use embassy_time::Timer;
use esp_backtrace as _;
use esp_hal::{
    gpio::{Input, InputConfig, Level, Output, OutputConfig, Pull},
    timer::timg::TimerGroup,
};
use esp_println::println;

#[esp_hal::main]
fn main() -> ! {
    let peripherals = esp_hal::init(esp_hal::Config::default());
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    // Loopback pair: jumper GPIO25 to GPIO26. The pull-down keeps the sense
    // pin deterministic on boards without the jumper.
    let drive = Output::new(peripherals.GPIO25, Level::Low, OutputConfig::default());
    let sense = Input::new(
        peripherals.GPIO26,
        InputConfig::default().with_pull(Pull::Down),
    );

    let mut executor = esp_rtos::embassy::Executor::new();
    let executor = unsafe { make_static(&mut executor) };
    executor.run(move |spawner| {
        spawner.must_spawn(chip_test_task(drive, sense));
    });
}

#[embassy_executor::task]
async fn chip_test_task(drive: Output<'static>, sense: Input<'static>) {
    println!("chiptest: hello world");

    let info = ChipInfo::read();
    println!(
        "chiptest: this is a {} chip with {} CPU core(s), {}",
        info.model,
        info.cores,
        info.features.label()
    );

    let mut test = GpioTest::new(drive, sense);
    let report = test.run(config::GPIO_TEST_CYCLES).await;
    if report.passed() {
        println!("chiptest: gpio loopback passed after {} cycles", report.cycles);
    } else {
        println!(
            "chiptest: gpio loopback saw {} mismatch(es) over {} cycles",
            report.mismatches, report.cycles
        );
    }

    for remaining in (0..=config::COUNTDOWN_START_SECONDS).rev() {
        println!("chiptest: restarting in {} seconds...", remaining);
        Timer::after_secs(1).await;
    }
    println!("chiptest: restarting now");
    esp_hal::system::software_reset();
}

unsafe fn make_static<T>(value: &mut T) -> &'static mut T {
    unsafe { core::mem::transmute(value) }
}
