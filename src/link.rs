use std::io::Write;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("failed to open serial port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },
    #[error("serial port is not open")]
    NotOpen,
    #[error("serial write failed: {0}")]
    Write(#[from] std::io::Error),
    #[error("failed to enumerate serial ports: {0}")]
    Enumerate(#[source] serialport::Error),
}

/// Opens byte sinks by port name. The connection closes when the sink drops.
pub trait Transport {
    type Link: Write;

    fn open(&mut self, port: &str, baud: u32) -> Result<Self::Link, LinkError>;
}

/// Real serial ports: 8N1, no flow control.
pub struct SerialTransport {
    timeout: Duration,
}

impl SerialTransport {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Transport for SerialTransport {
    type Link = Box<dyn serialport::SerialPort>;

    fn open(&mut self, port: &str, baud: u32) -> Result<Self::Link, LinkError> {
        let link = serialport::new(port, baud)
            .timeout(self.timeout)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None)
            .open()
            .map_err(|source| LinkError::Open {
                port: port.to_string(),
                source,
            })?;
        log::info!("Opened serial port {} at {} baud", port, baud);
        Ok(link)
    }
}

/// Names of the serial ports present right now, in enumeration order.
pub fn list_ports() -> Result<Vec<String>, LinkError> {
    let ports = serialport::available_ports().map_err(LinkError::Enumerate)?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

/// The explicit choice wins; otherwise the first enumerated port.
pub fn select_port(explicit: Option<&str>, available: &[String]) -> Option<String> {
    match explicit {
        Some(name) if !name.is_empty() => Some(name.to_string()),
        _ => available.first().cloned(),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_port_prefers_explicit() {
        let available = vec!["/dev/ttyUSB0".to_string(), "/dev/ttyACM0".to_string()];
        assert_eq!(
            select_port(Some("/dev/ttyS3"), &available).as_deref(),
            Some("/dev/ttyS3")
        );
    }

    #[test]
    fn test_select_port_falls_back_to_first() {
        let available = vec!["/dev/ttyUSB0".to_string(), "/dev/ttyACM0".to_string()];
        assert_eq!(select_port(None, &available).as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(select_port(Some(""), &available).as_deref(), Some("/dev/ttyUSB0"));
    }

    #[test]
    fn test_select_port_none_available() {
        assert_eq!(select_port(None, &[]), None);
    }

    #[test]
    fn test_open_error_names_port() {
        let err = LinkError::Open {
            port: "/dev/ttyNOPE".to_string(),
            source: serialport::Error::new(serialport::ErrorKind::NoDevice, "no such device"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/dev/ttyNOPE"), "{}", msg);
        assert!(msg.contains("no such device"), "{}", msg);
    }
}
