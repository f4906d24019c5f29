//! Control laws for the transform stage
//!
//! The transform stage turns every [`Sample`] into exactly one [`Command`].
//! The default law inverts the sample; a Rhai expression can replace it.
//!
//! ## Script Variables
//!
//! Scripts see a single integer variable:
//!
//! - `sample` - the current sample, in `-32768..=32767`
//!
//! The script's value (integer or float) becomes the command. Floats are
//! rounded, and everything is clamped to the `i16` range.
//!
//! ## Helper Functions
//!
//! - `invert(x)` - `-x`, saturating at the `i16` range
//! - `saturate(x)` - clamp to the `i16` range
//! - `deadband(x, width)` - `0` when `|x| < width`, otherwise `x`
//! - `map_range(x, in_min, in_max, out_min, out_max)` - linear remap
//!
//! ## Example Scripts
//!
//! Half gain, inverted:
//! ```rhai
//! -sample / 2
//! ```
//!
//! Ignore small readings:
//! ```rhai
//! invert(deadband(sample, 16))
//! ```

use crate::error::{Result, TelemetryError};
use crate::types::{Command, Sample};
use rhai::{Dynamic, Engine, Scope, AST};

/// Name of the only variable a control law script can read.
pub const SAMPLE_VAR: &str = "sample";

/// A pure function from one sample to one command.
#[derive(Debug, Default)]
pub enum ControlLaw {
    /// `command = -sample`, saturating for `i16::MIN`
    #[default]
    Invert,
    /// A compiled Rhai expression
    Script(ScriptLaw),
}

impl ControlLaw {
    /// Build a law from optional script source. `None` gives [`ControlLaw::Invert`].
    pub fn from_source(source: Option<&str>) -> Result<Self> {
        match source {
            Some(src) if !src.trim().is_empty() => Ok(ControlLaw::Script(ScriptLaw::compile(src)?)),
            _ => Ok(ControlLaw::Invert),
        }
    }

    /// Compute the command for one sample.
    pub fn apply(&self, sample: Sample) -> Result<Command> {
        match self {
            ControlLaw::Invert => Ok(invert(sample)),
            ControlLaw::Script(law) => law.eval(sample),
        }
    }

    pub fn describe(&self) -> &str {
        match self {
            ControlLaw::Invert => "invert",
            ControlLaw::Script(law) => law.source(),
        }
    }
}

/// Negate a sample. `-(-32768)` is not representable and saturates to 32767.
pub fn invert(sample: Sample) -> Command {
    sample.saturating_neg()
}

/// A control law backed by a compiled Rhai AST.
pub struct ScriptLaw {
    engine: Engine,
    ast: AST,
    source: String,
}

impl std::fmt::Debug for ScriptLaw {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptLaw")
            .field("source", &self.source)
            .finish()
    }
}

impl ScriptLaw {
    /// Compile `source` and check it yields a number across the sample range.
    pub fn compile(source: &str) -> Result<Self> {
        let mut engine = Engine::new();
        configure_engine(&mut engine);

        let ast = engine
            .compile(source)
            .map_err(|e| TelemetryError::Script(format!("Compilation error: {}", e)))?;

        let law = Self {
            engine,
            ast,
            source: source.to_string(),
        };

        for probe in [Sample::MIN, 0, Sample::MAX] {
            law.eval(probe).map_err(|e| {
                TelemetryError::Script(format!("Validation failed for sample {}: {}", probe, e))
            })?;
        }

        tracing::debug!("Compiled control law: {}", source.trim());
        Ok(law)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate the script for one sample.
    pub fn eval(&self, sample: Sample) -> Result<Command> {
        let mut scope = Scope::new();
        scope.push_constant(SAMPLE_VAR, sample as i64);

        let value = self
            .engine
            .eval_ast_with_scope::<Dynamic>(&mut scope, &self.ast)
            .map_err(TelemetryError::from_rhai_error)?;

        to_command(value)
    }
}

fn to_command(value: Dynamic) -> Result<Command> {
    if let Ok(i) = value.as_int() {
        return Ok(saturate(i));
    }
    if let Ok(f) = value.as_float() {
        if f.is_nan() {
            return Err(TelemetryError::Script("Script returned NaN".to_string()));
        }
        // `as` saturates for out-of-range floats
        return Ok(f.round() as Command);
    }
    Err(TelemetryError::Script(format!(
        "Script must return a number, got {}",
        value.type_name()
    )))
}

fn saturate(x: i64) -> Command {
    x.clamp(Command::MIN as i64, Command::MAX as i64) as Command
}

fn configure_engine(engine: &mut Engine) {
    engine.set_max_expr_depths(64, 64);
    engine.set_max_call_levels(32);
    engine.set_max_operations(10_000);
    engine.set_max_string_size(1_000);
    engine.set_max_array_size(256);
    engine.set_max_map_size(256);

    engine.register_fn("invert", |x: i64| -> i64 { saturate(x.saturating_neg()) as i64 });
    engine.register_fn("saturate", |x: i64| -> i64 { saturate(x) as i64 });
    engine.register_fn("deadband", |x: i64, width: i64| -> i64 {
        if x.abs() < width {
            0
        } else {
            x
        }
    });
    engine.register_fn(
        "map_range",
        |x: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64| -> f64 {
            (x - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
        },
    );
}

/// Ready-made control law scripts
pub mod builtins {
    /// Same result as [`super::ControlLaw::Invert`]
    pub const INVERT: &str = "invert(sample)";

    /// Inverted at half gain
    pub const HALF_GAIN: &str = "-sample / 2";

    /// Inverted, with readings below 16 counts treated as zero
    pub const DEADBAND_16: &str = "invert(deadband(sample, 16))";

    /// Sample range remapped onto 0..=1000
    pub const DUTY_PERMILLE: &str = "map_range(sample.to_float(), -32768.0, 32767.0, 0.0, 1000.0)";

    pub fn all() -> Vec<(&'static str, &'static str)> {
        vec![
            ("Invert", INVERT),
            ("Half gain", HALF_GAIN),
            ("Deadband 16", DEADBAND_16),
            ("Duty (permille)", DUTY_PERMILLE),
        ]
    }
}
