// ============================================================
// Layer 3: Domain Layer
// ============================================================
// Pure Rust structs and traits describing the core concepts:
// a sentence as padded token ids, and where sentences come from.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits

// A sentence as fixed-length vocabulary ids plus its true length
pub mod sentence;

// Core abstractions (traits) that other layers implement
pub mod traits;
