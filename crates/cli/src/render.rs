// History Rendering - tables over the recorded run
//
// All rendering lives outside the core; this module only reads the
// history value the engine exposes.

use clap::ValueEnum;
use colored::Colorize;
use tabled::{Table, Tabled};

use shopfloor_core::domain::{History, MachinePhase, State};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RenderMode {
    /// Run summary only
    Default,
    /// Per-component utilization table
    Dashboard,
    /// Event table plus a final state dump
    Debug,
    /// Event table
    Simulation,
}

#[derive(Tabled)]
struct EventRow {
    #[tabled(rename = "t")]
    time: u64,
    #[tabled(rename = "transitions")]
    transitions: String,
}

#[derive(Tabled)]
struct JobRow {
    #[tabled(rename = "job")]
    id: String,
    #[tabled(rename = "location")]
    location: String,
    #[tabled(rename = "progress")]
    progress: String,
}

#[derive(Tabled)]
struct UtilizationRow {
    #[tabled(rename = "machine")]
    id: String,
    #[tabled(rename = "working")]
    working: String,
    #[tabled(rename = "setup")]
    setup: String,
    #[tabled(rename = "outage")]
    outage: String,
}

pub fn render(mode: RenderMode, history: &History) {
    match mode {
        RenderMode::Default => {}
        RenderMode::Simulation => print_events(history),
        RenderMode::Dashboard => print_utilization(history),
        RenderMode::Debug => {
            print_events(history);
            print_final_state(history.last_state());
        }
    }
}

fn print_events(history: &History) {
    let rows: Vec<EventRow> = history
        .records
        .iter()
        .map(|r| EventRow {
            time: r.time.0,
            transitions: r.message.clone(),
        })
        .collect();
    println!("{}", "Events".bold());
    println!("{}", Table::new(rows));
}

fn print_final_state(state: &State) {
    let rows: Vec<JobRow> = state
        .jobs
        .iter()
        .map(|j| JobRow {
            id: j.id.clone(),
            location: j.location.clone(),
            progress: format!(
                "{}/{}",
                j.operations.iter().filter(|o| o.is_done()).count(),
                j.operations.len()
            ),
        })
        .collect();
    println!("{}", "Final state".bold());
    println!("{}", Table::new(rows));
}

/// Share of simulated time each machine spent per phase, integrated over
/// the recorded state sequence.
fn print_utilization(history: &History) {
    let total = history.last_state().time.0.max(1);
    let mut rows = vec![];
    for machine in &history.initial.machines {
        let mut working = 0u64;
        let mut setup = 0u64;
        let mut outage = 0u64;
        for (old, record) in history.pairs() {
            let span = record.time.0 - old.time.0;
            let phase = old
                .machines
                .iter()
                .find(|m| m.id == machine.id)
                .map(|m| m.phase)
                .unwrap_or(MachinePhase::Idle);
            match phase {
                MachinePhase::Working => working += span,
                MachinePhase::Setup => setup += span,
                MachinePhase::Outage => outage += span,
                MachinePhase::Idle => {}
            }
        }
        let pct = |v: u64| format!("{:.0}%", 100.0 * v as f64 / total as f64);
        rows.push(UtilizationRow {
            id: machine.id.clone(),
            working: pct(working),
            setup: pct(setup),
            outage: pct(outage),
        });
    }
    println!("{}", "Utilization".bold());
    println!("{}", Table::new(rows));
}
