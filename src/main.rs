use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod completion;
mod db;
mod engine;
mod error;
mod loader;
mod models;
mod paginate;
mod report;
mod store;

use engine::{grade_completeness, CompletenessQuery};
use models::Term;
use paginate::DEFAULT_PAGE_SIZE;

#[derive(Parser)]
#[command(name = "grade-completeness")]
#[command(about = "Tracks which grades are still missing for a school year and term", long_about = None)]
struct Cli {
    /// Tracing filter directive, e.g. `info` or `grade_completeness=debug`
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[arg(long, global = true, default_value_t = 5)]
    max_connections: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum TermArg {
    Midyear,
    Final,
}

impl From<TermArg> for Term {
    fn from(value: TermArg) -> Self {
        match value {
            TermArg::Midyear => Term::Midyear,
            TermArg::Final => Term::Final,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Markdown,
    Json,
}

impl Format {
    fn default_out(self) -> PathBuf {
        match self {
            Format::Markdown => PathBuf::from("completeness.md"),
            Format::Json => PathBuf::from("completeness.json"),
        }
    }
}

#[derive(Args)]
struct Scope {
    /// Defaults to the active school year
    #[arg(long)]
    school_year_id: Option<Uuid>,
    /// Defaults to the school year's own term
    #[arg(long, value_enum)]
    term: Option<TermArg>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a sample school year
    Seed,
    /// Import grade records from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Print overall completion and the least complete classes
    Summary {
        #[command(flatten)]
        scope: Scope,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Print one page of students with missing grades
    Students {
        #[command(flatten)]
        scope: Scope,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: u32,
    },
    /// Write the full completeness report
    Report {
        #[command(flatten)]
        scope: Scope,
        #[arg(long)]
        include_students: bool,
        #[arg(long)]
        include_details: bool,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: u32,
        #[arg(long, value_enum, default_value = "markdown")]
        format: Format,
        /// Defaults to completeness.md or completeness.json by format
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

impl Scope {
    fn query(&self) -> CompletenessQuery {
        CompletenessQuery {
            school_year_id: self.school_year_id,
            term: self.term.map(Term::from),
            ..CompletenessQuery::default()
        }
    }
}

fn init_tracing(directive: &str) {
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let database_url =
        std::env::var("DATABASE_URL").context("DATABASE_URL must be set to a Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(cli.max_connections)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;
    let store = db::PgStore::new(pool.clone());

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let imported = db::import_csv(&pool, &csv).await?;
            println!("Imported {imported} grades from {}.", csv.display());
        }
        Commands::Summary { scope, limit } => {
            let report = grade_completeness(&store, &scope.query()).await?;
            let summary = &report.summary;
            println!(
                "{} ({}): {}/{} grades recorded, {} missing, {:.1}% complete",
                report.school_year.name,
                report.term,
                summary.completed,
                summary.expected,
                summary.missing,
                summary.completion_pct
            );

            let mut classes = report.by_class;
            classes.sort_by(|a, b| {
                a.row
                    .completion_pct
                    .total_cmp(&b.row.completion_pct)
                    .then_with(|| a.class_name.cmp(&b.class_name))
            });
            if classes.is_empty() {
                println!("No active classes with assignments.");
                return Ok(());
            }

            println!("Least complete classes:");
            for class in classes.iter().take(limit) {
                println!(
                    "- {}: {:.1}% ({} of {} missing)",
                    class.class_name, class.row.completion_pct, class.row.missing, class.row.expected
                );
            }
        }
        Commands::Students {
            scope,
            page,
            page_size,
        } => {
            let query = CompletenessQuery {
                include_students: true,
                students_page: page,
                students_page_size: page_size,
                ..scope.query()
            };
            let report = grade_completeness(&store, &query).await?;
            let students = &report.missing_by_student;

            if students.total == 0 {
                println!("Every expected grade is recorded.");
                return Ok(());
            }

            println!(
                "{} students with missing grades (page {}, {} per page):",
                students.total, students.page, students.page_size
            );
            for entry in &students.items {
                println!(
                    "- {} ({}): {} missing [{}]",
                    entry.student_name,
                    entry.class_name,
                    entry.missing_count,
                    entry.subjects.join(", ")
                );
            }
        }
        Commands::Report {
            scope,
            include_students,
            include_details,
            page,
            page_size,
            format,
            out,
        } => {
            let query = CompletenessQuery {
                include_students,
                include_details,
                students_page: page,
                students_page_size: page_size,
                ..scope.query()
            };
            let report = grade_completeness(&store, &query).await?;
            let contents = match format {
                Format::Markdown => report::build_report(
                    &report,
                    report::Sections {
                        students: include_students,
                        details: include_details,
                    },
                    Utc::now(),
                ),
                Format::Json => report::build_json(&report)?,
            };
            let out = out.unwrap_or_else(|| format.default_out());
            std::fs::write(&out, contents)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report_out(args: &[&str]) -> PathBuf {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Report { format, out, .. } => out.unwrap_or_else(|| format.default_out()),
            _ => panic!("expected report command"),
        }
    }

    #[test]
    fn report_output_path_follows_format() {
        assert_eq!(
            report_out(&["grade-completeness", "report"]),
            PathBuf::from("completeness.md")
        );
        assert_eq!(
            report_out(&["grade-completeness", "report", "--format", "json"]),
            PathBuf::from("completeness.json")
        );
        assert_eq!(
            report_out(&["grade-completeness", "report", "--format", "json", "--out", "x.json"]),
            PathBuf::from("x.json")
        );
    }
}
