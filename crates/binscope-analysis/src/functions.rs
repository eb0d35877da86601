//! Function-start detection.
//!
//! A linear pass over the listing: a new function begins at the first
//! non-`int3` instruction after an end-of-function boundary. `int3` padding
//! therefore never opens a function but does close one.

use std::collections::BTreeMap;

use binscope_core::{flow, strip_hex, Instruction};

/// Detects function starts and assigns `sub_<hex>` labels.
///
/// Returns a map from canonical start address to label.
pub fn detect_functions(instructions: &[Instruction]) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    let mut at_boundary = true;

    for inst in instructions {
        let mnemonic = inst.mnemonic_key();
        if at_boundary && mnemonic != "int3" {
            let value = inst.addr_value().unwrap_or(0);
            labels.insert(inst.address.clone(), format!("sub_{}", strip_hex(value)));
            at_boundary = false;
        }
        if flow::ends_function(&mnemonic) {
            at_boundary = true;
        }
    }

    labels
}
