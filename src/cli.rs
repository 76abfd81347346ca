//! Command-line argument definitions for the `sim` binary, grounded on
//! the teacher's `xflags!`-based `RvSimArgs`.

use std::path::PathBuf;

xflags::xflags! {
    /// RV32I five-stage pipeline simulator.
    cmd SimArgs {
        /// Path to the program to run: an ELF binary or a flat file of
        /// little-endian 32-bit words, sniffed by the `\x7fELF` magic.
        required program: PathBuf

        /// Tick count; defaults to the drain rule `words.len() + 4`.
        optional -n, --ticks count: u64

        /// Prints the final register file and a handful of trap CSRs
        /// after simulation.
        optional --dump-regs

        /// Narrates fetch address, stalls and flushes every tick.
        optional -v, --verbose
    }
}
