// Entry point and high-level CLI flow.
//
// One session drives one pipeline at a time:
// - Option [1] loads a district data file (CSV or spreadsheet).
// - Option [2] runs aggregation, thresholding, and zone classification,
//   storing the result in the session slot.
// - Option [3] re-filters the stored result by zone and exports it, without
//   re-running the analysis.
// - Option [4] runs the batch age-profile analysis over the fixed-name
//   input files in the working directory.
mod aggregate;
mod classify;
mod errors;
mod loader;
mod output;
mod report;
mod thresholds;
mod types;
mod util;

use classify::{ActionCatalog, ZonePolicy};
use loader::DataTable;
use once_cell::sync::Lazy;
use report::AnalysisResult;
use std::collections::HashSet;
use std::io::{self, Write};
use std::path::Path;
use types::Zone;

// Session-scoped state: the loaded table and the most recent completed
// analysis. A new load or run overwrites its slot wholesale, so filtering
// and exporting always see exactly one run's output.
static APP_STATE: Lazy<std::sync::Mutex<AppState>> = Lazy::new(|| {
    std::sync::Mutex::new(AppState {
        table: None,
        result: None,
    })
});

struct AppState {
    table: Option<DataTable>,
    result: Option<AnalysisResult>,
}

/// Optional wording overrides for the recommended actions.
const ACTIONS_CONFIG_FILE: &str = "zone_actions.json";
const DEFAULT_EXPORT_FILE: &str = "zone_allocation_report.csv";

/// Read a single line of input after printing the common "Enter choice:" prompt.
///
/// The prompt is reused for the main menu and the smaller selection menus.
fn read_choice() -> String {
    read_line("Enter choice: ")
}

fn read_line(prompt: &str) -> String {
    print!("{}", prompt);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

/// Handle option [1]: load a tabular data file into the session.
fn handle_load() {
    let input = read_line("Data file path [district_data.csv]: ");
    let path = if input.is_empty() {
        "district_data.csv".to_string()
    } else {
        input
    };
    match loader::load_table(Path::new(&path)) {
        Ok(table) => {
            println!(
                "Loaded {} rows with {} columns.",
                util::format_int(table.rows.len() as i64),
                table.headers.len()
            );
            if table.rows.is_empty() {
                println!("Note: the file has a header but no data rows.");
            }
            println!("");
            let mut state = APP_STATE.lock().unwrap();
            state.table = Some(table);
        }
        Err(e) => {
            eprintln!("Failed to load file: {}\n", e);
        }
    }
}

fn prompt_policy() -> ZonePolicy {
    loop {
        println!("Classification strategy:");
        println!("[1] Fixed cut-offs");
        println!("[2] Adaptive percentiles");
        println!("[3] Adaptive percentiles (extended)");
        match read_choice().as_str() {
            "1" => return ZonePolicy::fixed_cutoffs(),
            "2" => return ZonePolicy::adaptive(),
            "3" => return ZonePolicy::adaptive_extended(),
            _ => println!("Invalid choice. Please enter 1, 2 or 3."),
        }
    }
}

/// Action wording comes from `zone_actions.json` when the file exists,
/// otherwise the built-in defaults.
fn load_actions() -> ActionCatalog {
    let path = Path::new(ACTIONS_CONFIG_FILE);
    if !path.exists() {
        return ActionCatalog::default();
    }
    match ActionCatalog::from_json_file(path) {
        Ok(catalog) => catalog,
        Err(e) => {
            log::warn!("ignoring {}: {}", ACTIONS_CONFIG_FILE, e);
            ActionCatalog::default()
        }
    }
}

fn print_threshold(name: &str, value: Option<f64>) {
    match value {
        Some(v) => println!("- {}: {}", name, util::format_number(v, 2)),
        None => println!("- {}: undefined (no districts)", name),
    }
}

/// Handle option [2]: run the full pipeline on the loaded table and store
/// the result in the session slot.
fn handle_analysis() {
    let table = {
        let state = APP_STATE.lock().unwrap();
        state.table.clone()
    };
    let Some(table) = table else {
        println!("Error: No data loaded. Please load a file first (option 1).\n");
        return;
    };

    let policy = prompt_policy();
    let actions = load_actions();
    match report::run_analysis(&table, &policy, &actions) {
        Ok(result) => {
            println!("\nThresholds ({}):", policy.name);
            print_threshold("High traffic (updates)", result.thresholds.update_high);
            print_threshold("High traffic (enrollment)", result.thresholds.enroll_high);
            print_threshold("Low activity (updates)", result.thresholds.update_low);
            println!("");
            output::preview_table_rows(&result.rows, 5);
            println!(
                "Analysis completed: {} rows aggregated into {} districts ({} high traffic, {} ghost, {} balanced).",
                util::format_int(result.report.input_rows as i64),
                util::format_int(result.report.districts as i64),
                result.zone_count(Zone::HighTraffic),
                result.zone_count(Zone::Ghost),
                result.zone_count(Zone::Balanced)
            );
            if result.report.empty_input {
                println!("Note: the input had no data rows; the report is empty.");
            }
            if result.report.coerced_cells > 0 {
                println!(
                    "Note: {} cell(s) could not be read as numbers and counted as zero.",
                    util::format_int(result.report.coerced_cells as i64)
                );
            }
            println!("");
            let mut state = APP_STATE.lock().unwrap();
            state.result = Some(result);
        }
        Err(e) => {
            eprintln!("Analysis failed: {}\n", e);
        }
    }
}

/// All zones are selected by default; entering numbers narrows the set and
/// `none` produces a header-only export.
fn prompt_zone_selection() -> HashSet<Zone> {
    println!("Zones: [1] High Traffic  [2] Ghost  [3] Balanced");
    let input = read_line("Select zones (e.g. 1,3; blank for all, 'none' for none): ");
    if input.is_empty() {
        return Zone::ALL.into_iter().collect();
    }
    if input.eq_ignore_ascii_case("none") {
        return HashSet::new();
    }
    let mut selected = HashSet::new();
    for part in input.split(',') {
        match part.trim() {
            "1" => {
                selected.insert(Zone::HighTraffic);
            }
            "2" => {
                selected.insert(Zone::Ghost);
            }
            "3" => {
                selected.insert(Zone::Balanced);
            }
            other => {
                if !other.is_empty() {
                    println!("Ignoring unknown zone '{}'.", other);
                }
            }
        }
    }
    selected
}

/// Handle option [3]: filter the stored result by zone and export it.
fn handle_export() {
    let result = {
        let state = APP_STATE.lock().unwrap();
        state.result.clone()
    };
    let Some(result) = result else {
        println!("Error: No analysis result. Please run the analysis first (option 2).\n");
        return;
    };

    let selected = prompt_zone_selection();
    let filtered = report::filter_by_zones(&result.rows, &selected);
    let input = read_line(&format!("Output file [{}]: ", DEFAULT_EXPORT_FILE));
    let path = if input.is_empty() {
        DEFAULT_EXPORT_FILE.to_string()
    } else {
        input
    };
    match report::export_report(Path::new(&path), &filtered) {
        Ok(()) => {
            output::preview_table_rows(&filtered, 5);
            println!(
                "{} of {} districts exported to {}.\n",
                util::format_int(filtered.len() as i64),
                util::format_int(result.rows.len() as i64),
                path
            );
        }
        Err(e) => {
            eprintln!("Write error: {}\n", e);
        }
    }
}

/// Handle option [4]: batch age-profile analysis over the fixed-name files
/// in the working directory.
fn handle_batch() {
    println!("Running batch age-profile analysis...");
    match report::run_batch(Path::new("."), &ZonePolicy::adaptive()) {
        Ok(outcome) => {
            println!("\nThresholds:");
            print_threshold("High traffic (updates)", outcome.thresholds.update_high);
            print_threshold("High traffic (enrollment)", outcome.thresholds.enroll_high);
            print_threshold("Low activity (updates)", outcome.thresholds.update_low);
            println!("");
            output::preview_table_rows(&outcome.rows, 5);
            println!(
                "{} districts merged ({} high traffic, {} ghost, {} balanced).",
                util::format_int(outcome.summary.districts as i64),
                outcome.summary.high_traffic,
                outcome.summary.ghost,
                outcome.summary.balanced
            );
            if outcome.coerced_cells > 0 {
                println!(
                    "Note: {} cell(s) could not be read as numbers and counted as zero.",
                    util::format_int(outcome.coerced_cells as i64)
                );
            }
            println!(
                "Output written to {} and {}.\n",
                report::BATCH_OUTPUT_FILE,
                report::BATCH_SUMMARY_FILE
            );
        }
        Err(e) => {
            eprintln!("Batch analysis failed: {}\n", e);
        }
    }
}

fn main() {
    env_logger::init();
    loop {
        println!("District Zone Allocation Tool");
        println!("[1] Load district data file");
        println!("[2] Run zone analysis");
        println!("[3] Filter & export report");
        println!("[4] Batch age-profile analysis");
        println!("[5] Exit\n");
        match read_choice().as_str() {
            "1" => handle_load(),
            "2" => handle_analysis(),
            "3" => handle_export(),
            "4" => handle_batch(),
            "5" => {
                println!("Exiting the program.");
                break;
            }
            _ => {
                println!("Invalid choice. Please enter 1-5.\n");
            }
        }
    }
}
