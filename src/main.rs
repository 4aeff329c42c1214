use chrono::Local;
use clap::Parser;
use permit_desk::core::boundary::BoundarySet;
use permit_desk::utils::error::{ErrorSeverity, PermitError};
use permit_desk::utils::prompt::StdinPrompter;
use permit_desk::utils::{logger, validation::Validate};
use permit_desk::{
    AppConfig, CensusGeocoder, Cli, CommandPrinter, Commands, CustomerRecord, FeeTable,
    FormEngine, FormLayout, FormPaths, LayoutCatalog, LocalStorage, PermitDesk,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.log_json {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::debug!("CLI arguments: {:?}", cli);

    let config = match AppConfig::load_or_default(&cli.config) {
        Ok(config) => config,
        Err(e) => exit_with(&e),
    };
    if let Err(e) = config.validate() {
        tracing::error!("Configuration validation failed: {}", e);
        tracing::error!("Suggestion: {}", e.recovery_suggestion());
        eprintln!("{}", e.user_friendly_message());
        std::process::exit(1);
    }

    if let Err(e) = run(cli.command, &config).await {
        exit_with(&e);
    }
    Ok(())
}

async fn run(command: Commands, config: &AppConfig) -> permit_desk::Result<()> {
    let mut prompter = StdinPrompter;

    match command {
        Commands::Fee { address } => {
            let address = match address {
                Some(address) => address,
                None => {
                    let path = config.customer_file();
                    let customer = CustomerRecord::load(&path)?;
                    customer.require_job_address(&path)?.to_string()
                }
            };
            let table = FeeTable::from_path(config.fee_table())?;
            let boundaries = BoundarySet::load(config.boundary_files());
            let geocoder = CensusGeocoder::new(config.geocoder.clone())?;

            PermitDesk::new(config, &table, &boundaries, &geocoder)
                .fee(&address, &mut prompter)
                .await?;
        }
        Commands::Check => {
            let table = FeeTable::from_path(config.fee_table())?;
            let boundaries = BoundarySet::load(config.boundary_files());
            let geocoder = CensusGeocoder::new(config.geocoder.clone())?;

            let checked = PermitDesk::new(config, &table, &boundaries, &geocoder)
                .check_loop(&mut prompter)
                .await?;
            tracing::info!("Done after {} addresses", checked);
        }
        Commands::Form { id, layout } => {
            let layout = match layout {
                Some(path) => FormLayout::from_file(&path)?,
                None => LayoutCatalog::load(config.layouts_dir().as_deref())?
                    .get(&id)?
                    .clone(),
            };
            let engine = FormEngine::new(
                LocalStorage::new(""),
                CommandPrinter::new(config.output.print_command.clone()),
                FormPaths::from_config(config),
            );

            let outcome = engine
                .run(&layout, Local::now().date_naive(), &mut prompter)
                .await?;
            tracing::info!(
                "Form '{}' finished: printed={}, deleted={}",
                layout.form.id,
                outcome.printed,
                outcome.deleted
            );
        }
        Commands::Forms => {
            let catalog = LayoutCatalog::load(config.layouts_dir().as_deref())?;
            for layout in catalog.iter() {
                println!(
                    "{:<15} {:<28} {}",
                    layout.form.id, layout.form.title, layout.form.template
                );
            }
        }
        Commands::Boundaries => {
            let boundaries = BoundarySet::load(config.boundary_files());
            if boundaries.is_empty() {
                println!("No boundary files could be loaded.");
            }
            for boundary in boundaries.iter() {
                match boundary.bounding_rect() {
                    Some(rect) => println!(
                        "{:<22} {:>6} vertices  lon {:.5}..{:.5}  lat {:.5}..{:.5}",
                        boundary.name,
                        boundary.vertex_count(),
                        rect.min().x,
                        rect.max().x,
                        rect.min().y,
                        rect.max().y
                    ),
                    None => println!("{:<22} (empty)", boundary.name),
                }
            }
        }
    }
    Ok(())
}

fn exit_with(e: &PermitError) -> ! {
    tracing::error!(
        "{} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("{}", e.user_friendly_message());
    eprintln!("Suggestion: {}", e.recovery_suggestion());

    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code)
}
