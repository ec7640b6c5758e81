use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

mod cohort;
mod db;
mod error;
mod export;
mod models;
mod period;
mod report;
mod score;
#[cfg(test)]
mod testutil;

use period::PeriodUnit;
use report::ReportConfig;

#[derive(Parser)]
#[command(name = "helpdesk-reports")]
#[command(about = "Survey satisfaction and usage reports for the campus helpdesk", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Dashboard headline numbers
    Summary,
    /// Ticket volume share per category over an explicit window
    Trends {
        /// RFC3339 window start; defaults to 30 days back
        #[arg(long)]
        start: Option<DateTime<Utc>>,
        /// RFC3339 window end; defaults to the end of today
        #[arg(long)]
        end: Option<DateTime<Utc>>,
    },
    /// Volume-weighted satisfaction per service category
    SatisfactionSummary {
        #[arg(long, default_value = "monthly")]
        period: String,
        #[arg(long, default_value_t = 6)]
        periods: usize,
        #[arg(long = "exclude-category")]
        exclude_category: Vec<String>,
    },
    /// Responding-user cohorts and their retention curve
    Cohort {
        #[arg(long, default_value = "monthly")]
        period: String,
        #[arg(long, default_value_t = 5)]
        periods: usize,
    },
    /// Per-question satisfaction for a survey template
    Satisfaction {
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        template: Option<String>,
        #[arg(long, default_value = "monthly")]
        period: String,
        #[arg(long, default_value_t = 5)]
        periods: usize,
    },
    /// Write the raw responses for one category as a CSV file
    Export {
        #[arg(long)]
        category: String,
        #[arg(long)]
        template: Option<String>,
        #[arg(long, default_value = "monthly")]
        period: String,
        #[arg(long, default_value_t = 5)]
        periods: usize,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Ticket and survey volumes per period
    Usage {
        #[arg(long, default_value = "monthly")]
        period: String,
        #[arg(long, default_value_t = 5)]
        periods: usize,
    },
    /// Ticket/survey matrix per organizational entity and category
    EntityService {
        #[arg(long, default_value = "monthly")]
        period: String,
        #[arg(long, default_value_t = 5)]
        periods: usize,
        #[arg(long = "exclude-category")]
        exclude_category: Vec<String>,
    },
    /// Survey templates linked to a category
    Templates {
        #[arg(long)]
        category: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    let store = db::PgStore::new(pool.clone());
    let now = Utc::now();

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Summary => {
            let summary = report::dashboard_summary(&store, now).await?;
            println!("Total tickets: {}", summary.total_tickets);
            println!("Open tickets: {}", summary.open_tickets);
            println!("Resolved this month: {}", summary.resolved_this_period);
            println!("Average rating: {:.1}", summary.avg_rating);
        }
        Commands::Trends { start, end } => {
            let today = period::period_start(now, PeriodUnit::Daily);
            let start = start.unwrap_or_else(|| period::add_periods(today, PeriodUnit::Daily, -29));
            let end = end.unwrap_or_else(|| period::add_periods(today, PeriodUnit::Daily, 1));
            let rows = report::service_trends(&store, start, end).await?;
            if rows.is_empty() {
                println!("No tickets in this window.");
            }
            for row in rows {
                println!("- {}: {:.1}%", row.label, row.percentage);
            }
        }
        Commands::SatisfactionSummary {
            period,
            periods,
            exclude_category,
        } => {
            let config = report_config(exclude_category);
            let rows = report::service_satisfaction_summary(
                &store,
                &config,
                PeriodUnit::parse(&period),
                periods,
                now,
            )
            .await?;
            for row in rows {
                println!(
                    "- {}: avg {:.1} over {} responses ({:.1}% share)",
                    row.label, row.avg_score, row.responses, row.percentage
                );
            }
        }
        Commands::Cohort { period, periods } => {
            let rows =
                cohort::cohort_report(&store, PeriodUnit::parse(&period), periods, now).await?;
            for row in rows {
                println!(
                    "- {}: {} users, avg {:.1}, response rate {:.1}%, retention {:?}",
                    row.label, row.users, row.avg_score, row.response_rate, row.retention
                );
            }
        }
        Commands::Satisfaction {
            category,
            template,
            period,
            periods,
        } => {
            let report = report::survey_satisfaction(
                &store,
                category.as_deref(),
                template.as_deref(),
                PeriodUnit::parse(&period),
                periods,
                now,
            )
            .await?;
            println!("{} / {} ({})", report.category, report.template, report.period);
            for row in &report.rows {
                println!(
                    "- {} [{}]: avg {:.1} across {} answers",
                    row.question, row.question_type, row.avg_score, row.responses
                );
            }
        }
        Commands::Export {
            category,
            template,
            period,
            periods,
            out_dir,
        } => {
            let export = export::survey_satisfaction_export(
                &store,
                Some(&category),
                template.as_deref(),
                PeriodUnit::parse(&period),
                periods,
                now,
            )
            .await?;
            let path = out_dir.join(&export.filename);
            std::fs::write(&path, &export.body)?;
            println!("Export written to {}.", path.display());
        }
        Commands::Usage { period, periods } => {
            let rows =
                cohort::usage_cohort(&store, PeriodUnit::parse(&period), periods, now).await?;
            for row in rows {
                println!("- {}: {} tickets, {} surveys", row.label, row.tickets, row.surveys);
            }
        }
        Commands::EntityService {
            period,
            periods,
            exclude_category,
        } => {
            let config = report_config(exclude_category);
            let rows = report::entity_service_matrix(
                &store,
                &config,
                PeriodUnit::parse(&period),
                periods,
                now,
            )
            .await?;
            for row in rows {
                println!(
                    "- {} x {}: {} tickets, {} surveys",
                    row.entity, row.category, row.tickets, row.surveys
                );
            }
        }
        Commands::Templates { category } => {
            let templates = report::templates_by_category(&store, &category).await?;
            if templates.is_empty() {
                println!("No templates linked to this category.");
            }
            for template in templates {
                println!(
                    "- {} ({}), {} questions",
                    template.title,
                    template.id,
                    template.questions.len()
                );
            }
        }
    }

    Ok(())
}

fn report_config(exclude: Vec<String>) -> ReportConfig {
    if exclude.is_empty() {
        ReportConfig::default()
    } else {
        ReportConfig {
            excluded_categories: exclude.into_iter().collect(),
        }
    }
}
