//! Built-in processor classes for vectra graphs.
//!
//! This crate fills a [`ProcessorRegistry`] with the standard classes a patch
//! can name by tag. The engine's own singletons (`host_inputs`,
//! `events_to_signals`, `host_phasor`) live in `vectra-core` and are not
//! registered here.
//!
//! # Classes
//!
//! | class | inputs | outputs | attributes / params |
//! |---|---|---|---|
//! | `pass` | `in` | `out` | |
//! | `constant` | | `out` | `value` |
//! | `gain` | `in` | `out` | `gain` |
//! | `add` | `in1`, `in2` | `out` | |
//! | `multiply` | `in1`, `in2` | `out` | |
//! | `divide` | `in1`, `in2` | `out` | |
//! | `sine` | `freq` | `out` | `freq` |
//! | `patcher` | `in1`..`in4` | `out1`..`out4` | `matrix` (4x4) |
//!
//! # Example
//!
//! ```rust
//! use vectra_core::ProcessorRegistry;
//! use vectra_registry::WithBuiltins;
//!
//! let registry = ProcessorRegistry::with_builtins();
//! for class in registry.all() {
//!     println!("{}: {}", class.class, class.description);
//! }
//! assert!(registry.contains("sine"));
//! ```

pub mod arith;
pub mod basic;
pub mod patcher;
pub mod sine;

pub use arith::{Binary, BinaryOp};
pub use basic::{Constant, Gain, PassThrough};
pub use patcher::{PATCHER_SIZE, Patcher};
pub use sine::Sine;

use vectra_core::{ProcessorCategory, ProcessorDescriptor, ProcessorRegistry};

const IN: &[&str] = &["in"];
const OUT: &[&str] = &["out"];
const BINARY_INPUTS: &[&str] = &["in1", "in2"];

/// Adds every built-in class to `registry`.
pub fn register_builtins(registry: &mut ProcessorRegistry) {
    // Utility
    registry.register(
        ProcessorDescriptor {
            class: "pass",
            description: "Copies its input unchanged",
            category: ProcessorCategory::Utility,
            inputs: IN,
            outputs: OUT,
            params: &[],
        },
        basic::make_pass,
    );

    // Generators
    registry.register(
        ProcessorDescriptor {
            class: "constant",
            description: "Outputs a fixed value",
            category: ProcessorCategory::Generator,
            inputs: &[],
            outputs: OUT,
            params: &["value"],
        },
        basic::make_constant,
    );
    registry.register(
        ProcessorDescriptor {
            class: "sine",
            description: "Sine oscillator, frequency from input or parameter",
            category: ProcessorCategory::Generator,
            inputs: &["freq"],
            outputs: OUT,
            params: &["freq"],
        },
        sine::make_sine,
    );

    // Arithmetic
    registry.register(
        ProcessorDescriptor {
            class: "gain",
            description: "Linear gain",
            category: ProcessorCategory::Arithmetic,
            inputs: IN,
            outputs: OUT,
            params: &["gain"],
        },
        basic::make_gain,
    );
    registry.register(
        ProcessorDescriptor {
            class: "add",
            description: "Sum of two signals",
            category: ProcessorCategory::Arithmetic,
            inputs: BINARY_INPUTS,
            outputs: OUT,
            params: &[],
        },
        arith::make_add,
    );
    registry.register(
        ProcessorDescriptor {
            class: "multiply",
            description: "Product of two signals",
            category: ProcessorCategory::Arithmetic,
            inputs: BINARY_INPUTS,
            outputs: OUT,
            params: &[],
        },
        arith::make_multiply,
    );
    registry.register(
        ProcessorDescriptor {
            class: "divide",
            description: "Quotient of two signals, silent on a zero divisor",
            category: ProcessorCategory::Arithmetic,
            inputs: BINARY_INPUTS,
            outputs: OUT,
            params: &[],
        },
        arith::make_divide,
    );

    // Routing
    registry.register(
        ProcessorDescriptor {
            class: "patcher",
            description: "4x4 matrix mixer",
            category: ProcessorCategory::Routing,
            inputs: &["in1", "in2", "in3", "in4"],
            outputs: &["out1", "out2", "out3", "out4"],
            params: &["matrix"],
        },
        patcher::make_patcher,
    );
}

/// A registry holding every built-in class.
pub fn builtin_registry() -> ProcessorRegistry {
    let mut registry = ProcessorRegistry::new();
    register_builtins(&mut registry);
    registry
}

/// Constructor for a [`ProcessorRegistry`] pre-filled with the built-ins.
pub trait WithBuiltins {
    /// Creates a registry with all built-in classes registered.
    fn with_builtins() -> Self;
}

impl WithBuiltins for ProcessorRegistry {
    fn with_builtins() -> Self {
        builtin_registry()
    }
}
