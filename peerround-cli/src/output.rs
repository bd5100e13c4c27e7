/// Output formatting: terminal tables and JSON.
use peerround_core::{Assignment, ReceivedFeedback, RoundOutcome, RoundWarning, Standing};
use serde::Serialize;

use crate::bail;
use crate::simulate::SimulationReport;

pub fn print_json<T: Serialize>(value: &T) {
    let json = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| bail(format!("Failed to serialize output: {e}")));
    println!("{json}");
}

fn print_warnings(warnings: &[RoundWarning]) {
    for w in warnings {
        println!("Warning: {w}");
    }
}

fn print_assignment(assignment: &Assignment) {
    let evaluator_width = assignment
        .keys()
        .map(|k| k.len())
        .max()
        .unwrap_or(9)
        .max(9); // at least "Evaluator"

    println!(" {:<evaluator_width$} | Pair", "Evaluator");
    println!("-{}-|-----", "-".repeat(evaluator_width));
    for (evaluator, pair) in assignment {
        println!(" {:<evaluator_width$} | {} vs {}", evaluator, pair.first(), pair.second());
    }
}

/// Print a round's assignment as a table: one row per evaluator.
pub fn print_round(activity: &str, outcome: &RoundOutcome) {
    println!("Activity {activity}, round {}", outcome.round);
    println!(
        "{} clusters, {} pairs, {} evaluators assigned\n",
        outcome.clusters.len(),
        outcome.pairs.len(),
        outcome.assignment.len(),
    );
    print_assignment(&outcome.assignment);

    if !outcome.warnings.is_empty() {
        println!();
        print_warnings(&outcome.warnings);
    }
}

/// Print standings with competition ranks.
pub fn print_standings(standings: &[Standing]) {
    let name_width = standings
        .iter()
        .map(|s| s.participant.len())
        .max()
        .unwrap_or(11)
        .max(11); // at least "Participant"

    println!(" # | {:<name_width$} | Wins | Losses | Judged", "Participant");
    println!("---|-{}-|------|--------|-------", "-".repeat(name_width));
    for s in standings {
        println!(
            "{:>2} | {:<name_width$} | {:>4} | {:>6} | {:>6}",
            s.rank, s.participant, s.wins, s.losses, s.evaluations_given,
        );
    }

    let comparisons: u32 = standings.iter().map(|s| s.wins).sum();
    println!("\n{} participants, {} evaluations recorded", standings.len(), comparisons);
}

pub fn print_simulation(report: &SimulationReport) {
    println!("Simulated {} participants over {} rounds\n", report.participants, report.rounds.len());
    println!("Round | Evaluations | Evaluators | Pairs | Warnings");
    println!("------|-------------|------------|-------|---------");
    for r in &report.rounds {
        println!(
            "{:>5} | {:>11} | {:>10} | {:>5} | {:>8}",
            r.round, r.evaluations, r.unique_evaluators, r.unique_pairs, r.warnings.len(),
        );
    }
    for r in report.rounds.iter().filter(|r| !r.warnings.is_empty()) {
        println!("\nRound {}:", r.round);
        print_warnings(&r.warnings);
    }
    println!();
    print_standings(&report.standings);
}

#[derive(Serialize)]
pub struct ActivityStatus<'a> {
    pub id: &'a str,
    pub round: usize,
    pub participants: usize,
    pub evaluations: usize,
    pub assignment: &'a Assignment,
    pub pending: Vec<&'a String>,
}

pub fn print_status(status: &ActivityStatus) {
    println!("Activity {}", status.id);
    if status.round == 0 {
        println!("{} participants, no round started yet", status.participants);
        return;
    }
    println!(
        "Round {}: {} participants, {} evaluations recorded so far",
        status.round, status.participants, status.evaluations,
    );
    println!();
    print_assignment(status.assignment);
    println!();
    if status.pending.is_empty() {
        println!("Every assigned evaluator has submitted.");
    } else {
        println!("Waiting on {} evaluators:", status.pending.len());
        for evaluator in &status.pending {
            println!("  {evaluator}");
        }
    }
}

pub fn print_feedback(participant: &str, received: &[ReceivedFeedback]) {
    if received.is_empty() {
        println!("No evaluations of {participant}'s submission yet.");
        return;
    }
    println!("Feedback for {participant}\n");
    for f in received {
        let round = f.round.map_or_else(|| "?".to_string(), |r| r.to_string());
        let verdict = if f.won { "won" } else { "lost" };
        let star = if f.starred { " *" } else { "" };
        println!("Round {round}, {verdict} (judged by {}){star}", f.evaluator);
        match &f.comments {
            Some(text) => println!("  {text}"),
            None => println!("  (no comments)"),
        }
    }
    let starred = received.iter().filter(|f| f.starred).count();
    println!("\n{} evaluations received, {} starred as helpful", received.len(), starred);
}

#[cfg(test)]
mod tests {
    use super::*;
    use peerround_core::UnorderedPair;

    #[test]
    fn test_status_json_includes_assignment() {
        let mut assignment = Assignment::new();
        assignment.insert("c@x.test".to_string(), UnorderedPair::new("b@x.test".to_string(), "a@x.test".to_string()));
        let pending_key = "c@x.test".to_string();
        let status = ActivityStatus {
            id: "essay",
            round: 2,
            participants: 3,
            evaluations: 3,
            assignment: &assignment,
            pending: vec![&pending_key],
        };

        let json: serde_json::Value = serde_json::to_value(&status).unwrap();
        assert_eq!(json["round"], 2);
        assert_eq!(json["assignment"]["c@x.test"], serde_json::json!(["a@x.test", "b@x.test"]));
        assert_eq!(json["pending"], serde_json::json!(["c@x.test"]));
    }
}
