use clap::Parser;
use embassy_executor::{Executor, Spawner};
use embassy_net::{Config, Ipv4Address, Ipv4Cidr, Runner, StackResources};
use embassy_net_tuntap::TunTapDevice;
use embassy_time::{Duration, Timer};
use heapless::Vec;
use rand_core::{OsRng, TryRngCore};
use static_cell::StaticCell;
use std::convert::Infallible;
use tdc_core::utils::controllers::drive::{DriveCommand, DriveWiring, PinActuator};
use tdc_core::utils::controllers::{SystemCommand, SYSTEM_CHANNEL};
use tdc_core::utils::{wss, SystemController};
use tracing::info;
use tracing_subscriber;

#[derive(Parser)]
#[clap(version = "1.0")]
struct Opts {
    /// TAP device name
    #[clap(long, default_value = "tap0")]
    tap: String,
    /// use a static IP instead of DHCP
    #[clap(long)]
    static_ip: bool,
    /// drive the binary Maisto wiring instead of the Velleman shield
    #[clap(long)]
    maisto: bool,
    /// feed a synthetic tilt sweep into the command channel
    #[clap(long)]
    sweep: bool,
}

/// Pin sink that logs writes instead of touching hardware.
struct ConsolePins;

impl PinActuator for ConsolePins {
    type Error = Infallible;

    fn digital_write(&mut self, pin: u8, high: bool) -> Result<(), Infallible> {
        info!("pin {pin} -> {}", if high { "HIGH" } else { "LOW" });
        Ok(())
    }

    fn analog_write(&mut self, pin: u8, value: u8) -> Result<(), Infallible> {
        info!("pin {pin} -> {value}/255");
        Ok(())
    }
}

#[embassy_executor::task]
async fn net_task(mut runner: Runner<'static, TunTapDevice>) -> ! {
    runner.run().await
}

#[embassy_executor::task]
async fn control_task(mut ctrl: SystemController<ConsolePins>) -> ! {
    ctrl.command_loop().await
}

/// Stand-in for the phone accelerometer: one reading every 100 ms, sweeping
/// through forward, a left turn, idle, and full reverse with a right turn.
#[embassy_executor::task]
async fn sweep_task() {
    let samples: [(f32, f32); 8] = [
        (0.0, 0.25),
        (0.0, 0.5),
        (-0.6, 0.5),
        (0.0, 0.1),
        (0.0, -0.25),
        (0.0, -0.75),
        (0.6, -1.0),
        (0.0, -0.25),
    ];
    loop {
        for &(lr, fb) in samples.iter() {
            let command = SystemCommand::D(DriveCommand::T { lr, fb });
            if let Ok(payload) = serde_json::to_string(&command) {
                tracing::debug!("sweep sample: {payload}");
            }
            SYSTEM_CHANNEL.send(command).await;
            Timer::after(Duration::from_millis(100)).await;
        }
    }
}

#[embassy_executor::task]
async fn main_task(spawner: Spawner) {
    let opts: Opts = Opts::parse();

    let wiring = if opts.maisto {
        DriveWiring::PinPerDirection {
            forward: 8,
            reverse: 9,
            left: 10,
            right: 11,
        }
    } else {
        DriveWiring::default()
    };

    let ctrl = SystemController::from_actuator(ConsolePins, Some(wiring), None);
    spawner.spawn(control_task(ctrl)).unwrap();

    if opts.sweep {
        spawner.spawn(sweep_task()).unwrap();
    }

    // Network setup over TUN/TAP
    let device = TunTapDevice::new(&opts.tap).unwrap();
    let config = if opts.static_ip {
        Config::ipv4_static(embassy_net::StaticConfigV4 {
            address: Ipv4Cidr::new(Ipv4Address::new(192, 168, 69, 2), 24),
            dns_servers: Vec::new(),
            gateway: Some(Ipv4Address::new(192, 168, 69, 1)),
        })
    } else {
        Config::dhcpv4(Default::default())
    };
    let mut seed_buf = [0; 8];
    OsRng.try_fill_bytes(&mut seed_buf).unwrap();
    let seed = u64::from_le_bytes(seed_buf);

    let resources = tdc_core::mk_static!(StackResources<3>, StackResources::new());
    let (stack, runner) = embassy_net::new(device, config, resources, seed);
    spawner.spawn(net_task(runner)).unwrap();

    info!("Starting WebSocket server on port 8000");
    wss(0, 8000, stack, None).await;
}

static EXECUTOR: StaticCell<Executor> = StaticCell::new();

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let executor = EXECUTOR.init(Executor::new());
    executor.run(|spawner| {
        spawner.spawn(main_task(spawner)).unwrap();
    });
}
