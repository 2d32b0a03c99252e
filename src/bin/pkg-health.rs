//! CLI tool for monitoring Python dependency health

use clap::{Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use package_health_monitor::{
    DependencyReport, HealthGrade, MonitorConfig, ReportGenerator, Severity,
};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "pkg-health")]
#[command(about = "Monitor Python project dependencies for health, security, and maintenance risks", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to custom configuration file (TOML)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Dependencies to ignore (can be specified multiple times)
    #[arg(long = "ignore")]
    ignore_dependencies: Vec<String>,

    /// GitHub API token for higher rate limits (or set GITHUB_TOKEN)
    #[arg(long)]
    github_token: Option<String>,

    /// Disable the on-disk cache
    #[arg(long)]
    no_cache: bool,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan project dependencies and display a health report
    Scan {
        /// Path to the project directory or a single manifest file
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Output format
        #[arg(short = 'f', long, default_value = "table")]
        format: ReportFormat,

        /// Output file (default: stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Exit non-zero if any open vulnerability at this severity or
        /// above is found
        #[arg(long)]
        fail_on: Option<Severity>,

        /// Display detailed information for each dependency
        #[arg(long)]
        detailed: bool,
    },

    /// Check the health of a single package
    Check {
        /// Package name (e.g. requests, django)
        package: String,

        /// Specific version to check (default: latest)
        #[arg(short = 'V', long)]
        version: Option<String>,
    },

    /// List known alternatives for a package
    Alternatives {
        /// Package name to find replacements for
        package: String,
    },
}

#[derive(Clone, Copy, Debug)]
enum ReportFormat {
    Table,
    Json,
    Markdown,
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(ReportFormat::Table),
            "json" => Ok(ReportFormat::Json),
            "markdown" | "md" => Ok(ReportFormat::Markdown),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    // Load configuration
    let mut config = if let Some(config_path) = &cli.config {
        match load_config(config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{} Failed to load config: {}", "Error:".red().bold(), e);
                process::exit(1);
            }
        }
    } else {
        MonitorConfig::default()
    };

    for dep in &cli.ignore_dependencies {
        config.ignored_dependencies.insert(dep.to_lowercase());
    }
    if let Some(token) = cli.github_token.clone() {
        config.network.github_token = Some(token);
    }
    if cli.no_cache {
        config.cache.enabled = false;
    }

    let generator = ReportGenerator::new(config);

    match cli.command {
        Commands::Scan {
            path,
            format,
            output,
            fail_on,
            detailed,
        } => run_scan(&generator, &path, format, output, fail_on, detailed).await,
        Commands::Check { package, version } => {
            run_check(&generator, &package, version.as_deref()).await
        }
        Commands::Alternatives { package } => run_alternatives(&package),
    }
}

async fn run_scan(
    generator: &ReportGenerator,
    path: &PathBuf,
    format: ReportFormat,
    output: Option<PathBuf>,
    fail_on: Option<Severity>,
    detailed: bool,
) {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    spinner.set_message("Scanning dependencies...");
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));

    let result = generator.scan_project(path).await;

    spinner.finish_and_clear();

    let reports = match result {
        Ok(reports) => reports,
        Err(e) => {
            eprintln!("{} Scan failed: {}", "Error:".red().bold(), e);
            process::exit(1);
        }
    };

    if reports.is_empty() {
        println!("No dependencies found in {}", path.display());
        return;
    }

    let rendered = match format {
        ReportFormat::Table => {
            display_summary(&reports);
            if detailed {
                println!();
                display_detailed(&reports);
            }
            None
        }
        ReportFormat::Json => Some(render_json(&reports)),
        ReportFormat::Markdown => Some(render_markdown(&reports)),
    };

    if let Some(content) = rendered {
        match &output {
            Some(output_path) => match std::fs::write(output_path, &content) {
                Ok(_) => println!("Report written to: {}", output_path.display()),
                Err(e) => {
                    eprintln!("{} Failed to write report: {}", "Error:".red().bold(), e);
                    process::exit(1);
                }
            },
            None => println!("{}", content),
        }
    }

    if let Some(threshold) = fail_on {
        let failing: Vec<_> = reports
            .iter()
            .filter(|r| {
                r.health
                    .open_vulnerabilities()
                    .iter()
                    .any(|v| v.severity <= threshold)
            })
            .collect();

        if !failing.is_empty() {
            eprintln!(
                "\n{} {} dependencies with open {} (or worse) vulnerabilities:",
                "Failed:".red().bold(),
                failing.len(),
                threshold
            );
            for report in &failing {
                eprintln!(
                    "  - {}: {} open vulnerability(ies)",
                    report.package.name,
                    report.health.open_vulnerabilities().len()
                );
            }
            process::exit(1);
        }
    }
}

async fn run_check(generator: &ReportGenerator, package: &str, version: Option<&str>) {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    spinner.set_message(format!("Checking {}...", package));
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));

    let result = generator.check_package(package, version).await;

    spinner.finish_and_clear();

    match result {
        Ok(report) => display_report(&report),
        Err(e) => {
            eprintln!("{} Check failed: {}", "Error:".red().bold(), e);
            process::exit(1);
        }
    }
}

fn run_alternatives(package: &str) {
    use package_health_monitor::AlternativesRecommender;

    let recommender = AlternativesRecommender::default();
    let known = recommender.known_alternatives(package);

    if known.is_empty() {
        println!("No known alternatives for {}", package);
        return;
    }

    println!("{}", format!("Alternatives to {}:", package).bold());
    for name in known {
        println!("  - {}", name);
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_config(path: &PathBuf) -> Result<MonitorConfig, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    let config: MonitorConfig = toml::from_str(&content)?;
    Ok(config)
}

fn grade_colored(grade: HealthGrade) -> ColoredString {
    match grade {
        HealthGrade::A => grade.to_string().green().bold(),
        HealthGrade::B => grade.to_string().green(),
        HealthGrade::C => grade.to_string().yellow(),
        HealthGrade::D => grade.to_string().truecolor(255, 165, 0),
        HealthGrade::F => grade.to_string().red().bold(),
    }
}

fn display_summary(reports: &[DependencyReport]) {
    println!("\n{}", "=== Dependency Health Summary ===".bold());
    println!("Total dependencies: {}", reports.len());
    println!();

    let healthy = reports.iter().filter(|r| r.health.is_healthy()).count();
    let concerning = reports.iter().filter(|r| r.health.is_concerning()).count();
    let vulnerable = reports
        .iter()
        .filter(|r| r.health.has_open_vulnerabilities())
        .count();

    println!(
        "  {} {}",
        "●".green(),
        format!("Healthy (A/B): {}", healthy).green()
    );
    println!(
        "  {} {}",
        "●".red(),
        format!("Concerning (D/F): {}", concerning).red()
    );
    println!(
        "  {} {}",
        "●".red().bold(),
        format!("With open vulnerabilities: {}", vulnerable).red().bold()
    );
    println!();

    println!(
        "{:<30} {:>10} {:>7} {:>6} {:<12} {}",
        "Package".bold(),
        "Version".bold(),
        "Score".bold(),
        "Grade".bold(),
        "Status".bold(),
        "Vulns".bold()
    );

    for report in reports {
        let open = report.health.open_vulnerabilities().len();
        let vulns = if open > 0 {
            format!("{} open", open).red().to_string()
        } else if report.health.has_vulnerabilities() {
            format!("{} fixed", report.health.vulnerabilities.len())
        } else {
            "-".to_string()
        };

        println!(
            "{:<30} {:>10} {:>7.1} {:>6} {:<12} {}",
            report.package.name,
            report.package.version.as_deref().unwrap_or("latest"),
            report.health.overall,
            grade_colored(report.health.grade),
            report.health.maintenance_status.to_string(),
            vulns
        );
    }
}

fn display_detailed(reports: &[DependencyReport]) {
    println!("{}", "=== Detailed Results ===".bold());

    for report in reports {
        println!();
        display_report(report);
    }
}

fn display_report(report: &DependencyReport) {
    let health = &report.health;

    println!(
        "{} {} [{}] Score: {:.1} ({})",
        report.package.name.bold(),
        report.package.version.as_deref().unwrap_or("latest"),
        grade_colored(health.grade),
        health.overall,
        health.maintenance_status
    );

    println!(
        "  Security: {:.0}  Maintenance: {:.0}  Community: {:.0}  Popularity: {:.0}",
        health.security_score,
        health.maintenance_score,
        health.community_score,
        health.popularity_score
    );
    println!(
        "  Code quality: {:.0}  License: {:.0}  Confidence: {}",
        health.code_quality_score, health.license_score, health.confidence
    );

    if let Some(update) = &report.update_available {
        println!("  {} Update available: {}", "↑".cyan(), update.cyan());
    }

    let open = health.open_vulnerabilities();
    if !open.is_empty() {
        println!("  {}:", "Open vulnerabilities".red().bold());
        for vuln in open {
            println!("    - {}", vuln.to_string().red());
        }
    }
    let fixed = health.fixed_vulnerabilities();
    if !fixed.is_empty() {
        println!("  Fixed in this version:");
        for vuln in fixed {
            println!("    - {}", vuln);
        }
    }

    if !health.risk_factors.is_empty() {
        println!("  Risks:");
        for risk in &health.risk_factors {
            println!("    - {}", risk.yellow());
        }
    }

    if !health.positive_factors.is_empty() {
        println!("  Positives:");
        for positive in &health.positive_factors {
            println!("    - {}", positive.green());
        }
    }

    if !report.alternatives.is_empty() {
        println!("  Consider instead:");
        for alt in &report.alternatives {
            println!("    - {} ({})", alt.package.name.cyan(), alt.rationale);
        }
    }
}

fn render_json(reports: &[DependencyReport]) -> String {
    serde_json::to_string_pretty(reports).unwrap_or_else(|e| {
        eprintln!("Failed to serialize report: {}", e);
        process::exit(1);
    })
}

fn render_markdown(reports: &[DependencyReport]) -> String {
    let mut md = String::new();

    md.push_str("# Dependency Health Report\n\n");
    md.push_str(&format!("Total dependencies: {}\n\n", reports.len()));

    md.push_str("| Package | Version | Score | Grade | Status | Open Vulns |\n");
    md.push_str("|---------|---------|-------|-------|--------|------------|\n");

    for report in reports {
        md.push_str(&format!(
            "| {} | {} | {:.1} | {} | {} | {} |\n",
            report.package.name,
            report.package.version.as_deref().unwrap_or("latest"),
            report.health.overall,
            report.health.grade,
            report.health.maintenance_status,
            report.health.open_vulnerabilities().len()
        ));
    }

    let concerning: Vec<_> = reports.iter().filter(|r| r.needs_attention()).collect();
    if !concerning.is_empty() {
        md.push_str("\n## Needs attention\n\n");
        for report in concerning {
            md.push_str(&format!(
                "### {} ({:.1}, grade {})\n\n",
                report.package.name, report.health.overall, report.health.grade
            ));
            for risk in &report.health.risk_factors {
                md.push_str(&format!("- {}\n", risk));
            }
            md.push('\n');
        }
    }

    md
}
