use clap::Parser;

/// Drag a virtual joystick with your mouse and stream its position over a
/// serial port as "<x>,<y>\n" lines (Linux/evdev).
/// Hold the left button and move the mouse to deflect the stick.
#[derive(Parser, Debug)]
#[command(name = crate::PROGRAM)]
pub struct Config {
    /// Serial port to transmit on (defaults to the first port found)
    #[arg(short, long)]
    pub port: Option<String>,

    /// Serial baud rate
    #[arg(short, long, default_value_t = 9600)]
    pub baud: u32,

    /// Virtual canvas width in pixels
    #[arg(long, default_value_t = 200)]
    pub width: u32,

    /// Virtual canvas height in pixels
    #[arg(long, default_value_t = 200)]
    pub height: u32,

    /// Knob radius in canvas pixels
    #[arg(long, default_value_t = crate::joystick::KNOB_RADIUS)]
    pub knob_radius: f64,

    /// Transmit and display interval in milliseconds
    #[arg(long, default_value_t = 100)]
    pub interval_ms: u64,

    /// Serial write timeout in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub timeout_ms: u64,

    /// Mouse sensitivity multiplier (canvas pixels per mouse count)
    #[arg(short, long, default_value_t = 1.0)]
    pub sensitivity: f32,

    /// Specific evdev device path (e.g. /dev/input/event5)
    #[arg(short, long)]
    pub device: Option<String>,

    /// Grab the mouse exclusively while transmitting
    #[arg(long, default_value_t = false)]
    pub grab: bool,

    /// Start transmitting immediately
    #[arg(long, default_value_t = false)]
    pub autostart: bool,

    /// Print the displayed X/Y values on every display tick
    #[arg(long, default_value_t = false)]
    pub debug: bool,
}
