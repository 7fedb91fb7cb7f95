/*!
Populating the record store with a student roster from a .csv file,
for local experimentation or first-run setup.

```bash
cargo run --bin seed -- fakeprod_data/students.csv
```

Rows whose studentId is already on file are skipped, so the seeder is
safe to run more than once. Reads the same configuration file as the
server (`ROLLBOOK_CONFIG`, default `rollbook.toml`).
*/
use simplelog::{ColorChoice, TerminalMode, TermLogger};

use rollbook::config;
use rollbook::student::NewStudent;

async fn run(csv_path: &str) -> Result<(), String> {
    let config_path = std::env::var("ROLLBOOK_CONFIG")
        .unwrap_or_else(|_| "rollbook.toml".to_owned());
    let glob = config::load_configuration(&config_path).await?;

    let f = std::fs::File::open(csv_path)
        .map_err(|e| format!("Unable to open {}: {}", csv_path, &e))?;
    let roster = NewStudent::vec_from_csv_reader(f)?;
    log::info!("Read {} roster rows from {}.", roster.len(), csv_path);

    let mut n_inserted: usize = 0;
    let mut n_skipped: usize = 0;
    for new in roster.iter() {
        let preexisting = glob.store
            .get_student_by_student_id(&new.student_id).await
            .map_err(|e| format!(
                "Error checking for student {:?}: {}",
                &new.student_id, e.display()
            ))?;
        if preexisting.is_some() {
            log::warn!(
                "Student ID {:?} already on file; skipping.",
                &new.student_id
            );
            n_skipped += 1;
            continue;
        }

        glob.store.insert_student(new).await
            .map_err(|e| format!(
                "Error inserting student {:?}: {}",
                &new.student_id, e.display()
            ))?;
        n_inserted += 1;
    }

    log::info!(
        "Seeding complete: {} inserted, {} skipped.",
        n_inserted, n_skipped
    );
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let log_cfg = simplelog::ConfigBuilder::new()
        .add_filter_allow_str("rollbook")
        .build();
    TermLogger::init(
        rollbook::log_level_from_env(),
        log_cfg,
        TerminalMode::Stdout,
        ColorChoice::Auto
    ).unwrap();

    let csv_path = match std::env::args().nth(1) {
        Some(p) => p,
        None => {
            eprintln!("usage: seed <roster.csv>");
            std::process::exit(2);
        },
    };

    if let Err(e) = run(&csv_path).await {
        log::error!("Seeding failed: {}", &e);
        std::process::exit(1);
    }
}
