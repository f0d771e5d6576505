// gpu/mod.rs — GPU acceleration layer.
//
// wgpu compute kernels that mirror CPU functions in the parent crate. The
// CPU implementations remain the authoritative reference; every GPU kernel
// is validated against them.
//
// Kernels run in f64 and need an adapter with `SHADER_F64`. Tests that
// touch a real device are #[ignore]d; run them with
//   cargo test -- --include-ignored

pub mod device;
pub mod filter2d;
