// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types shared by every other layer.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain structs, enums and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

/// A single 3-D position record
pub mod position;

/// Atom systems handed to an exported model by a host simulation
pub mod atoms;

/// Core abstractions (traits) that other layers implement
pub mod traits;
