pub mod export;
pub mod init;
pub mod run;
pub mod serve;

use crate::postprod::{PublishResult, Rejection};

/// Print `result` to stdout and turn anything but a publish into an error.
pub fn report(result: &PublishResult, json: bool) -> Result<(), anyhow::Error> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        print_summary(result);
    }

    match result {
        PublishResult::Published { .. } => Ok(()),
        PublishResult::Failed {
            stage,
            cause,
            message,
            ..
        } => Err(anyhow::anyhow!("failed while {stage} ({cause}): {message}")),
        PublishResult::Rejected { rejection, reason } => match rejection {
            Rejection::Busy => Err(anyhow::anyhow!("branch is busy: {reason}")),
            Rejection::Invalid => Err(anyhow::anyhow!("invalid request: {reason}")),
        },
    }
}

fn print_summary(result: &PublishResult) {
    match result {
        PublishResult::Published {
            branch,
            commit,
            pushed,
            files,
            puzzle_url,
            solution_url,
            warnings,
        } => {
            match (commit, pushed) {
                (Some(commit), true) => println!("Pushed {commit} to branch '{branch}'"),
                (Some(commit), false) => println!("Committed {commit} on branch '{branch}' (not pushed)"),
                (None, _) => println!("Branch '{branch}' is already up to date"),
            }
            for file in files {
                println!("  {file}");
            }
            for url in [puzzle_url, solution_url].into_iter().flatten() {
                println!("Preview: {url}");
            }
            for warning in warnings {
                println!("warning: {warning}");
            }
        }
        PublishResult::Failed {
            left_in_working_copy,
            working_copy,
            warnings,
            ..
        } => {
            if !left_in_working_copy.is_empty() {
                println!("Written before the failure (not pushed):");
                for file in left_in_working_copy {
                    println!("  {file}");
                }
            }
            if let Some(path) = working_copy {
                println!("Working copy kept at {}", path.display());
            }
            for warning in warnings {
                println!("warning: {warning}");
            }
        }
        PublishResult::Rejected { .. } => {}
    }
}
