use std::io::{self, BufRead, Write};

use thiserror::Error;

use crate::{
    config::CliCommand,
    mutator::{MutationError, TableMutator},
    render,
};

pub const CLEAR_PROMPT: &str = "Are you sure you want to clear all records? This cannot be undone. [y/N] ";

const INVALID_ADD: &str = "Please enter valid product, store, and price.";
const INVALID_DELETE: &str = "Please enter both the product name and store name to delete.";
const NOT_FOUND: &str = "Product with that store not found in the selected table.";

#[derive(Debug, Error)]
pub enum CommandError {
    /// Bad input or a missing entry; state is unchanged.
    #[error("{message}")]
    Rejected {
        message: &'static str,
        #[source]
        source: MutationError,
    },
    #[error(transparent)]
    Mutation(#[from] MutationError),
    #[error("IO error: {0}")]
    IOError(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Report to print after the command ran.
    Report(String),
    /// Clear was declined at the prompt; nothing changed.
    Cancelled,
}

/// Asks a yes/no question; anything but `y`/`yes` is a no.
pub fn confirm<R: BufRead, W: Write>(input: &mut R, output: &mut W, prompt: &str) -> io::Result<bool> {
    output.write_all(prompt.as_bytes())?;
    output.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

pub fn execute<R: BufRead, W: Write>(
    mutator: &mut TableMutator,
    command: &CliCommand,
    input: &mut R,
    output: &mut W,
) -> Result<Outcome, CommandError> {
    let comparison = match command {
        CliCommand::Show => mutator.recompute(),
        CliCommand::Add { table, product, store, price } => {
            let table = mutator.resolve_table(table)?;
            mutator.add_entry(&table, product, store, price)
                .map_err(|e| reject(e, INVALID_ADD))?
        },
        CliCommand::Delete { table, product, store } => {
            let table = mutator.resolve_table(table)?;
            mutator.delete_entry(&table, product, store)
                .map_err(|e| reject(e, INVALID_DELETE))?
        },
        CliCommand::Clear { yes } => {
            if !*yes && !confirm(input, output, CLEAR_PROMPT)? {
                tracing::info!("Clear all cancelled");
                return Ok(Outcome::Cancelled);
            }
            mutator.clear_all()?
        },
    };

    Ok(Outcome::Report(render::report(mutator.store(), &comparison)))
}

fn reject(err: MutationError, invalid_message: &'static str) -> CommandError {
    match err {
        MutationError::Validation(_) => CommandError::Rejected { message: invalid_message, source: err },
        MutationError::NotFound { .. } => CommandError::Rejected { message: NOT_FOUND, source: err },
        other => CommandError::Mutation(other),
    }
}
