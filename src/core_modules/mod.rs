pub mod analyzer;
pub mod angle;
pub mod exercise;
pub mod form_rules;
pub mod hold_timer;
pub mod issue_ledger;
pub mod joint;
pub mod rep_machine;
pub mod smoother;
pub mod stance;

#[cfg(test)]
pub(crate) mod test_support;
