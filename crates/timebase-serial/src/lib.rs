//! Serial device configuration seam.
//!
//! The surrounding robot stack talks to the embedded motor controller
//! over a point-to-point serial link. This subsystem never drives that
//! data path; it only consumes the device's bring-up contract: open,
//! set mode, set baud, enable flow control, close. The [`SerialDevice`]
//! trait captures exactly that contract so the daemon can configure the
//! port and tests can verify the settings without hardware.

use timebase_common::{FlowControl, Parity, TimebaseError, TimebaseResult};

#[cfg(target_os = "linux")]
pub use termios_serial::TermiosSerial;

/// Serial device bring-up contract.
///
/// Opening is each implementation's constructor; everything else mutates
/// an already-open port. All operations are configuration-only.
pub trait SerialDevice: Send {
    /// Set data bits (5-8), parity, and stop bits (1-2).
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for out-of-range bit counts, `Serial` for
    /// device-level failures.
    fn set_mode(&mut self, databits: u8, parity: Parity, stopbits: u8) -> TimebaseResult<()>;

    /// Change the baud rate.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for unsupported rates, `Serial` for
    /// device-level failures.
    fn set_baud(&mut self, baud: u32) -> TimebaseResult<()>;

    /// Enable hardware or software flow control.
    ///
    /// # Errors
    ///
    /// `Serial` for device-level failures.
    fn enable_flow_control(&mut self, kind: FlowControl) -> TimebaseResult<()>;

    /// Close the port. Further configuration calls fail.
    ///
    /// # Errors
    ///
    /// `Serial` if the device rejects the close.
    fn close(&mut self) -> TimebaseResult<()>;
}

/// Validate mode arguments shared by all backends.
fn validate_mode(databits: u8, stopbits: u8) -> TimebaseResult<()> {
    if !(5..=8).contains(&databits) {
        return Err(TimebaseError::InvalidArgument(format!(
            "databits must be 5-8, got {databits}"
        )));
    }
    if !(1..=2).contains(&stopbits) {
        return Err(TimebaseError::InvalidArgument(format!(
            "stopbits must be 1 or 2, got {stopbits}"
        )));
    }
    Ok(())
}

/// Settings a simulated port has accepted, for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedSettings {
    /// Last applied baud rate.
    pub baud: u32,
    /// Data bits.
    pub databits: u8,
    /// Parity.
    pub parity: Parity,
    /// Stop bits.
    pub stopbits: u8,
    /// Flow-control kinds enabled, in order.
    pub flow_control: Vec<FlowControl>,
}

/// In-memory serial device that records its configuration.
#[derive(Debug)]
pub struct SimulatedSerial {
    port: String,
    settings: AppliedSettings,
    open: bool,
}

impl SimulatedSerial {
    /// "Open" a simulated port at the given baud rate.
    #[must_use]
    pub fn open(port: &str, baud: u32, _blocking: bool) -> Self {
        Self {
            port: port.to_string(),
            settings: AppliedSettings {
                baud,
                databits: 8,
                parity: Parity::None,
                stopbits: 1,
                flow_control: Vec::new(),
            },
            open: true,
        }
    }

    /// Port name this device was opened with.
    #[must_use]
    pub fn port(&self) -> &str {
        &self.port
    }

    /// Settings applied so far.
    #[must_use]
    pub fn settings(&self) -> &AppliedSettings {
        &self.settings
    }

    fn check_open(&self) -> TimebaseResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(TimebaseError::Serial(format!(
                "port {} is closed",
                self.port
            )))
        }
    }
}

impl SerialDevice for SimulatedSerial {
    fn set_mode(&mut self, databits: u8, parity: Parity, stopbits: u8) -> TimebaseResult<()> {
        self.check_open()?;
        validate_mode(databits, stopbits)?;
        self.settings.databits = databits;
        self.settings.parity = parity;
        self.settings.stopbits = stopbits;
        Ok(())
    }

    fn set_baud(&mut self, baud: u32) -> TimebaseResult<()> {
        self.check_open()?;
        self.settings.baud = baud;
        Ok(())
    }

    fn enable_flow_control(&mut self, kind: FlowControl) -> TimebaseResult<()> {
        self.check_open()?;
        self.settings.flow_control.push(kind);
        Ok(())
    }

    fn close(&mut self) -> TimebaseResult<()> {
        self.open = false;
        Ok(())
    }
}

#[cfg(target_os = "linux")]
mod termios_serial {
    use super::{validate_mode, SerialDevice};
    use nix::sys::termios::{self, BaudRate, ControlFlags, InputFlags, SetArg, Termios};
    use std::fs::{File, OpenOptions};
    use std::os::unix::fs::OpenOptionsExt;
    use std::path::{Path, PathBuf};
    use timebase_common::{FlowControl, Parity, TimebaseError, TimebaseResult};
    use tracing::{debug, info};

    /// Real serial port configured through termios.
    ///
    /// Opened raw at 8N1, no flow control, receiver enabled, modem
    /// control lines ignored - the same baseline the robot's embedded
    /// controller expects before any mode changes.
    #[derive(Debug)]
    pub struct TermiosSerial {
        file: Option<File>,
        path: PathBuf,
    }

    impl TermiosSerial {
        /// Open and configure a port for raw I/O at the given baud rate.
        ///
        /// # Errors
        ///
        /// `Serial` if the device cannot be opened or configured,
        /// `InvalidArgument` for an unsupported baud rate.
        pub fn open(path: &Path, baud: u32, blocking: bool) -> TimebaseResult<Self> {
            let mut flags = libc::O_NOCTTY;
            if !blocking {
                flags |= libc::O_NONBLOCK;
            }

            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .custom_flags(flags)
                .open(path)
                .map_err(|e| {
                    TimebaseError::Serial(format!("failed to open {}: {e}", path.display()))
                })?;

            let mut tios = termios::tcgetattr(&file).map_err(|e| {
                TimebaseError::Serial(format!("tcgetattr on {}: {e}", path.display()))
            })?;

            // Raw 8N1 baseline: no character handling, no flow control
            termios::cfmakeraw(&mut tios);
            tios.control_flags |= ControlFlags::CLOCAL | ControlFlags::CREAD;
            tios.control_flags &=
                !(ControlFlags::PARENB | ControlFlags::PARODD | ControlFlags::CSTOPB);

            let rate = baud_rate(baud)?;
            termios::cfsetspeed(&mut tios, rate).map_err(|e| {
                TimebaseError::Serial(format!("cfsetspeed({baud}) on {}: {e}", path.display()))
            })?;

            termios::tcsetattr(&file, SetArg::TCSANOW, &tios).map_err(|e| {
                TimebaseError::Serial(format!("tcsetattr on {}: {e}", path.display()))
            })?;

            info!(port = %path.display(), baud, blocking, "Serial port opened");
            Ok(Self {
                file: Some(file),
                path: path.to_path_buf(),
            })
        }

        fn file(&self) -> TimebaseResult<&File> {
            self.file.as_ref().ok_or_else(|| {
                TimebaseError::Serial(format!("port {} is closed", self.path.display()))
            })
        }

        /// Read-modify-write the port's termios settings.
        fn update<F>(&self, apply: F) -> TimebaseResult<()>
        where
            F: FnOnce(&mut Termios),
        {
            let file = self.file()?;
            let mut tios = termios::tcgetattr(file).map_err(|e| {
                TimebaseError::Serial(format!("tcgetattr on {}: {e}", self.path.display()))
            })?;
            apply(&mut tios);
            termios::tcsetattr(file, SetArg::TCSANOW, &tios).map_err(|e| {
                TimebaseError::Serial(format!("tcsetattr on {}: {e}", self.path.display()))
            })
        }
    }

    impl SerialDevice for TermiosSerial {
        fn set_mode(&mut self, databits: u8, parity: Parity, stopbits: u8) -> TimebaseResult<()> {
            validate_mode(databits, stopbits)?;

            let csize = match databits {
                5 => ControlFlags::CS5,
                6 => ControlFlags::CS6,
                7 => ControlFlags::CS7,
                _ => ControlFlags::CS8,
            };

            self.update(|tios| {
                tios.control_flags &= !(ControlFlags::CSIZE
                    | ControlFlags::PARENB
                    | ControlFlags::PARODD
                    | ControlFlags::CSTOPB);
                tios.control_flags |= csize;
                match parity {
                    Parity::None => {}
                    Parity::Even => tios.control_flags |= ControlFlags::PARENB,
                    Parity::Odd => {
                        tios.control_flags |= ControlFlags::PARENB | ControlFlags::PARODD;
                    }
                }
                if stopbits == 2 {
                    tios.control_flags |= ControlFlags::CSTOPB;
                }
            })?;

            debug!(
                port = %self.path.display(),
                databits, ?parity, stopbits,
                "Serial mode set"
            );
            Ok(())
        }

        fn set_baud(&mut self, baud: u32) -> TimebaseResult<()> {
            let rate = baud_rate(baud)?;
            let file = self.file()?;
            let mut tios = termios::tcgetattr(file).map_err(|e| {
                TimebaseError::Serial(format!("tcgetattr on {}: {e}", self.path.display()))
            })?;
            termios::cfsetspeed(&mut tios, rate).map_err(|e| {
                TimebaseError::Serial(format!("cfsetspeed({baud}): {e}"))
            })?;
            termios::tcsetattr(file, SetArg::TCSANOW, &tios).map_err(|e| {
                TimebaseError::Serial(format!("tcsetattr on {}: {e}", self.path.display()))
            })?;

            debug!(port = %self.path.display(), baud, "Serial baud set");
            Ok(())
        }

        fn enable_flow_control(&mut self, kind: FlowControl) -> TimebaseResult<()> {
            self.update(|tios| match kind {
                FlowControl::RtsCts => {
                    tios.control_flags |= ControlFlags::CRTSCTS;
                }
                FlowControl::XonXoff => {
                    tios.input_flags |= InputFlags::IXON | InputFlags::IXOFF;
                }
            })?;

            debug!(port = %self.path.display(), ?kind, "Serial flow control enabled");
            Ok(())
        }

        fn close(&mut self) -> TimebaseResult<()> {
            if self.file.take().is_some() {
                debug!(port = %self.path.display(), "Serial port closed");
            }
            Ok(())
        }
    }

    /// Map an integer baud rate to its termios constant.
    ///
    /// Only the rates the robot hardware actually uses are supported.
    fn baud_rate(baud: u32) -> TimebaseResult<BaudRate> {
        let rate = match baud {
            9_600 => BaudRate::B9600,
            19_200 => BaudRate::B19200,
            38_400 => BaudRate::B38400,
            57_600 => BaudRate::B57600,
            115_200 => BaudRate::B115200,
            230_400 => BaudRate::B230400,
            _ => {
                return Err(TimebaseError::InvalidArgument(format!(
                    "unsupported baud rate {baud}"
                )))
            }
        };
        Ok(rate)
    }
}
