//! Contract rules for identity transactions.
//!
//! [`verify`] is a pure function of the transaction and the evaluation
//! date. The proposer runs it before signing, every counterparty runs it
//! before countersigning, and every recipient runs it again before
//! committing; all of them must reach the same verdict.

use time::{Date, Month};

use crate::identity::format_date;
use crate::record::{LinearId, RecordState};
use crate::transaction::{Command, Transaction};

/// Minimum age unless configured otherwise.
pub const DEFAULT_MINIMUM_AGE_YEARS: u8 = 18;

/// Tunable parameters of the identity contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractRules {
    pub minimum_age_years: u8,
}

impl Default for ContractRules {
    fn default() -> Self {
        Self {
            minimum_age_years: DEFAULT_MINIMUM_AGE_YEARS,
        }
    }
}

/// A contract rule that a transaction fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractViolation {
    #[error("shape: {command} requires {expected} input state(s), found {actual}")]
    InputCount {
        command: Command,
        expected: usize,
        actual: usize,
    },

    #[error("shape: {command} requires {expected} output state(s), found {actual}")]
    OutputCount {
        command: Command,
        expected: usize,
        actual: usize,
    },

    #[error("shape: update must keep linear id {input}, output has {output}")]
    LinearIdChanged { input: LinearId, output: LinearId },

    #[error("shape: linear id {linear_id} does not belong to identification no. {id_no}")]
    LinearIdMismatch { linear_id: LinearId, id_no: String },

    #[error("missing field: {0} must be filled")]
    MissingField(&'static str),

    #[error("age requirement: date of birth {dob} is after {cutoff}, must be at least {minimum_years} years old")]
    Underage {
        dob: String,
        cutoff: String,
        minimum_years: u8,
    },
}

/// Check `tx` against the rules for its command, evaluating age-based
/// rules as of `today`.
pub fn verify(tx: &Transaction, today: Date, rules: &ContractRules) -> Result<(), ContractViolation> {
    match tx.command {
        Command::Create => {
            require_inputs(tx, 0)?;
            require_outputs(tx, 1)?;
            verify_output(&tx.outputs[0], today, rules)
        }
        Command::Update => {
            require_inputs(tx, 1)?;
            require_outputs(tx, 1)?;
            let input = &tx.inputs[0].state;
            let output = &tx.outputs[0];
            if input.linear_id != output.linear_id {
                return Err(ContractViolation::LinearIdChanged {
                    input: input.linear_id.clone(),
                    output: output.linear_id.clone(),
                });
            }
            verify_output(output, today, rules)
        }
        Command::Delete => {
            require_inputs(tx, 1)?;
            require_outputs(tx, 0)
        }
    }
}

fn require_inputs(tx: &Transaction, expected: usize) -> Result<(), ContractViolation> {
    if tx.inputs.len() == expected {
        Ok(())
    } else {
        Err(ContractViolation::InputCount {
            command: tx.command,
            expected,
            actual: tx.inputs.len(),
        })
    }
}

fn require_outputs(tx: &Transaction, expected: usize) -> Result<(), ContractViolation> {
    if tx.outputs.len() == expected {
        Ok(())
    } else {
        Err(ContractViolation::OutputCount {
            command: tx.command,
            expected,
            actual: tx.outputs.len(),
        })
    }
}

fn verify_output(
    output: &RecordState,
    today: Date,
    rules: &ContractRules,
) -> Result<(), ContractViolation> {
    let identity = &output.identity;
    let required = [
        ("name", &identity.name),
        ("passportNo", &identity.passport_no),
        ("email", &identity.email),
        ("idNo", &identity.id_no),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(ContractViolation::MissingField(field));
        }
    }

    if output.linear_id != identity.linear_id() {
        return Err(ContractViolation::LinearIdMismatch {
            linear_id: output.linear_id.clone(),
            id_no: identity.id_no.clone(),
        });
    }

    let cutoff = years_before(today, rules.minimum_age_years);
    if identity.dob > cutoff {
        return Err(ContractViolation::Underage {
            dob: format_date(identity.dob),
            cutoff: format_date(cutoff),
            minimum_years: rules.minimum_age_years,
        });
    }
    Ok(())
}

/// The same calendar day `years` years earlier; 29 February maps to
/// 28 February in non-leap years.
fn years_before(date: Date, years: u8) -> Date {
    let year = date.year() - i32::from(years);
    Date::from_calendar_date(year, date.month(), date.day())
        .or_else(|_| Date::from_calendar_date(year, Month::February, 28))
        .unwrap_or(Date::MIN)
}
