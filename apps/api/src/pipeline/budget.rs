//! Budget fitting: scales a priced module list down to a budget.
//!
//! Algorithm:
//! 1. total ≤ budget → every module keeps its price.
//! 2. Otherwise discount = budget / total; final_price = max(1, ⌊price × discount⌋).
//! 3. While Σ final_price > budget, drop the last module.
//!
//! Order is preserved and never re-sorted; trimming always happens at the tail.

use crate::pipeline::state::{PricedModule, PricedModuleInput};

pub fn fit_to_budget(modules: Vec<PricedModuleInput>, budget: f64) -> Vec<PricedModule> {
    // A NaN budget cannot be satisfied by anything.
    let budget = if budget.is_nan() { 0.0 } else { budget };
    let total: u64 = modules.iter().map(|m| u64::from(m.price)).sum();

    if total as f64 <= budget {
        return modules
            .into_iter()
            .map(|m| {
                let price = m.price;
                PricedModule::from_input(m, price)
            })
            .collect();
    }

    let discount = if total == 0 {
        1.0
    } else {
        budget / total as f64
    };

    let mut bundle: Vec<PricedModule> = modules
        .into_iter()
        .map(|m| {
            let scaled = (f64::from(m.price) * discount).floor();
            let final_price = if scaled < 1.0 {
                1
            } else {
                (scaled as u32).min(m.price)
            };
            PricedModule::from_input(m, final_price)
        })
        .collect();

    while !bundle.is_empty() && bundle_total(&bundle) as f64 > budget {
        bundle.pop();
    }

    bundle
}

/// Sum of `final_price` over a bundle.
pub fn bundle_total(bundle: &[PricedModule]) -> u64 {
    bundle.iter().map(|m| u64::from(m.final_price)).sum()
}
