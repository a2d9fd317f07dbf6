mod config;
mod controller;
mod joystick;
mod link;
mod mouse;
mod schedule;
mod transmitter;

use clap::Parser;
use config::Config;
use controller::Controller;
use link::SerialTransport;
use mouse::{find_mouse_device, MouseReader, ReaderControl};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, TryRecvError};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Binary name; also what `/proc/<pid>/comm` shows for a running instance.
pub(crate) const PROGRAM: &str = "joy2serial";

static QUIT: AtomicBool = AtomicBool::new(false);
static START: AtomicBool = AtomicBool::new(false);
static STOP: AtomicBool = AtomicBool::new(false);

/// Longest the main loop sleeps before rechecking control flags.
const MAX_IDLE: Duration = Duration::from_millis(10);

fn main() {
    // Handle "joy2serial start|stop|quit|ports" before clap parsing.
    // The control words signal the running instance and exit immediately.
    if let Some(cmd) = std::env::args().nth(1) {
        match cmd.as_str() {
            "start" => {
                send_to_running(libc::SIGUSR1, "Start");
                return;
            }
            "stop" => {
                send_to_running(libc::SIGUSR2, "Stop");
                return;
            }
            "quit" => {
                send_to_running(libc::SIGTERM, "Quit");
                return;
            }
            "ports" => {
                print_ports();
                return;
            }
            _ => {}
        }
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let config = Config::parse();

    if config.width == 0 || config.height == 0 {
        log::error!("Canvas size must be non-zero (got {}x{})", config.width, config.height);
        std::process::exit(1);
    }

    // One-time snapshot; `joy2serial ports` shows a fresh list.
    let available = match link::list_ports() {
        Ok(ports) => ports,
        Err(e) => {
            log::warn!("{}", e);
            Vec::new()
        }
    };
    let port = link::select_port(config.port.as_deref(), &available);

    println!("{} - Virtual joystick over serial", PROGRAM);
    println!("  Port:        {}", port.as_deref().unwrap_or("No serial ports available"));
    println!("  Baud:        {}", config.baud);
    println!("  Canvas:      {}x{}", config.width, config.height);
    println!("  Interval:    {} ms", config.interval_ms);
    println!();

    signal_setup();

    // Find mouse device
    let device_path = match &config.device {
        Some(path) => path.clone(),
        None => match find_mouse_device() {
            Some(p) => {
                let s = p.to_string_lossy().to_string();
                log::info!("Auto-detected mouse: {}", s);
                s
            }
            None => {
                log::error!("No mouse device found. Are you in the 'input' group?");
                log::error!("Try: sudo usermod -aG input $USER (then re-login)");
                std::process::exit(1);
            }
        },
    };

    // Spawn mouse reader thread
    let control = Arc::new(ReaderControl::new());
    let (events_tx, events_rx) = mpsc::channel();
    let control_clone = Arc::clone(&control);
    let device_path_clone = device_path.clone();

    let spawned = std::thread::Builder::new()
        .name("mouse-reader".into())
        .spawn(move || {
            match MouseReader::new(&device_path_clone, control_clone, events_tx) {
                Ok(mut reader) => reader.run(),
                Err(e) => {
                    log::error!("Failed to open mouse device: {}", e);
                    log::error!("Check permissions on {}", device_path_clone);
                }
            }
        });
    if let Err(e) = spawned {
        log::error!("Failed to spawn mouse thread: {}", e);
        std::process::exit(1);
    }

    println!("Drag:   hold the left mouse button and move");
    println!("Start:  {} start", PROGRAM);
    println!("Stop:   {} stop", PROGRAM);
    println!("Quit:   {} quit", PROGRAM);
    println!();

    let period = Duration::from_millis(config.interval_ms.max(1));
    let transport = SerialTransport::new(Duration::from_millis(config.timeout_ms));
    let mut ctl = Controller::new(transport, config.baud, period, port)
        .with_sensitivity(config.sensitivity)
        .with_knob_radius(config.knob_radius);

    ctl.layout(f64::from(config.width), f64::from(config.height), Instant::now());
    if config.autostart {
        ctl.start(Instant::now());
    }

    let mut shown = None;

    loop {
        if QUIT.load(Ordering::Relaxed) {
            break;
        }
        if START.swap(false, Ordering::Relaxed) {
            ctl.start(Instant::now());
        }
        if STOP.swap(false, Ordering::Relaxed) {
            ctl.stop();
        }

        loop {
            match events_rx.try_recv() {
                Ok(ev) => ctl.pointer(ev),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    log::error!("Mouse reader stopped");
                    QUIT.store(true, Ordering::Relaxed);
                    break;
                }
            }
        }

        let polled = ctl.poll(Instant::now());
        if config.debug && polled.display.is_some() && polled.display != shown {
            if let Some(pos) = polled.display {
                let (left, top, right, bottom) = ctl.joystick().knob_bounds();
                eprintln!(
                    "X: {:+4}  Y: {:+4}  (knob {:.0},{:.0} to {:.0},{:.0})",
                    pos.x, pos.y, left, top, right, bottom
                );
            }
            shown = polled.display;
        }
        control
            .grab
            .store(config.grab && ctl.is_transmitting(), Ordering::Relaxed);

        schedule::sleep_until(ctl.next_deadline(), MAX_IDLE);
    }

    log::info!("Shutting down...");
    ctl.shutdown();
    control.grab.store(false, Ordering::Relaxed);
    // The reader may sit in a blocking read until the next mouse event;
    // process exit ends it.
    control.quit.store(true, Ordering::Relaxed);
    log::info!("Done");
}

fn print_ports() {
    match link::list_ports() {
        Ok(ports) if ports.is_empty() => println!("No serial ports available"),
        Ok(ports) => {
            for port in ports {
                println!("{}", port);
            }
        }
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}

fn signal_setup() {
    unsafe {
        libc::signal(libc::SIGINT, signal_handler as libc::sighandler_t);
        libc::signal(libc::SIGTERM, signal_handler as libc::sighandler_t);
        libc::signal(libc::SIGUSR1, signal_handler as libc::sighandler_t);
        libc::signal(libc::SIGUSR2, signal_handler as libc::sighandler_t);
    }
}

extern "C" fn signal_handler(sig: libc::c_int) {
    match sig {
        libc::SIGUSR1 => START.store(true, Ordering::Relaxed),
        libc::SIGUSR2 => STOP.store(true, Ordering::Relaxed),
        _ => QUIT.store(true, Ordering::Relaxed),
    }
}

/// Find PID of another running instance by scanning /proc.
fn find_running_instance() -> Option<i32> {
    let my_pid = std::process::id() as i32;
    for entry in std::fs::read_dir("/proc").ok()? {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };
        let pid: i32 = match entry.file_name().to_str().and_then(|s| s.parse().ok()) {
            Some(p) => p,
            None => continue,
        };
        if pid == my_pid {
            continue;
        }
        if let Ok(comm) = std::fs::read_to_string(entry.path().join("comm")) {
            if comm.trim() == PROGRAM {
                return Some(pid);
            }
        }
    }
    None
}

/// Send a signal to the running instance, or exit with an error.
fn send_to_running(sig: libc::c_int, action: &str) {
    match find_running_instance() {
        Some(pid) => {
            let ret = unsafe { libc::kill(pid, sig) };
            if ret == 0 {
                eprintln!("{} sent to {} (pid {})", action, PROGRAM, pid);
            } else {
                eprintln!("Failed to send signal to {} (pid {})", PROGRAM, pid);
                std::process::exit(1);
            }
        }
        None => {
            eprintln!("No running {} instance found", PROGRAM);
            std::process::exit(1);
        }
    }
}
