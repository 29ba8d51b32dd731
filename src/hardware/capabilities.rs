//! Bench Hardware Capabilities
//!
//! The engine talks to two devices, each through a small capability trait:
//!
//! - A programmable source-meter implements `CurrentSource`
//! - The leakage detection board, reached over its serial link, implements `LeakageSensor`
//!
//! Protocol details (SCPI strings, serial framing) live in the driver behind the trait. The
//! sampler, sweep controller and run orchestrator only ever see these handles, injected at
//! construction, which lets every test hand in a fresh mock.
//!
//! # Design Philosophy
//!
//! Each capability trait:
//! - Is async (uses #[async_trait])
//! - Is thread-safe (requires Send + Sync)
//! - Uses anyhow::Result for errors
//! - Takes `&self`; drivers keep their state behind interior mutability
//!
//! # Example
//!
//! ```rust,ignore
//! async fn settle_at(source: &dyn CurrentSource, amps: f64) -> Result<f64> {
//!     source.enable_output().await?;
//!     source.set_current(amps).await?;
//!     tokio::time::sleep(Duration::from_millis(150)).await;
//!     source.measure_current().await
//! }
//! ```

use anyhow::Result;
use async_trait::async_trait;

/// Capability: Programmable Current/Voltage Source
///
/// Devices that can source a current or a voltage and measure their own output.
///
/// # Contract
/// - Currents are in amperes, voltages in volts
/// - `set_current` / `set_voltage` return the value the instrument reads back
/// - Commands outside the instrument's range must return Err
/// - Output state is only changed by `enable_output` / `disable_output`
#[async_trait]
pub trait CurrentSource: Send + Sync {
    /// Switch to current mode and command `amps`.
    ///
    /// # Returns
    /// - Ok(measured) with the current read back after the command
    /// - Err if the value is out of range or on communication failure
    async fn set_current(&self, amps: f64) -> Result<f64>;

    /// Switch to voltage mode and command `volts`.
    async fn set_voltage(&self, volts: f64) -> Result<f64>;

    /// Turn the output on.
    async fn enable_output(&self) -> Result<()>;

    /// Turn the output off.
    async fn disable_output(&self) -> Result<()>;

    /// Measure the output current, in amperes.
    async fn measure_current(&self) -> Result<f64>;

    /// Measure the output voltage, in volts.
    async fn measure_voltage(&self) -> Result<f64>;

    /// Set the compliance voltage used in current mode.
    ///
    /// # Default Implementation
    /// Returns an error indicating compliance limits are not supported.
    async fn set_protection_voltage(&self, _volts: f64) -> Result<f64> {
        anyhow::bail!("Protection voltage not supported by this instrument")
    }

    /// Set the compliance current used in voltage mode.
    ///
    /// # Default Implementation
    /// Returns an error indicating compliance limits are not supported.
    async fn set_protection_current(&self, _amps: f64) -> Result<f64> {
        anyhow::bail!("Protection current not supported by this instrument")
    }
}

/// Capability: Leakage Detection Board
///
/// The board under test, exposing scalar variables by address (leakage current, board
/// temperature) and an interlock reset used by the degauss procedure.
///
/// # Contract
/// - `read` returns the raw variable value; unit scaling is the caller's business
/// - `reset_interlocks` may be issued at any time and is idempotent
#[async_trait]
pub trait LeakageSensor: Send + Sync {
    /// Read the variable at `address`.
    async fn read(&self, address: u16) -> Result<f64>;

    /// Clear latched interlocks on the board.
    async fn reset_interlocks(&self) -> Result<()>;
}
