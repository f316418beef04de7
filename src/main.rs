use anyhow::Result;
use clap::Parser;

use region_aggregator::data::json::load_dataset;
use region_aggregator::cluster::grouping::group_by_id_token;
use region_aggregator::{
    aggregate, storage, viz, AggregationConfig, AggregationHierarchy, AggregationOutcome, AggregationStrategy,
    Diagnostics, Linkage,
};

#[derive(Parser, Debug)]
#[clap(
    name = "region-aggregator",
    about = "Aggregate fine-grained regions into a hierarchy of coarser groupings"
)]
struct Cli {
    /// Path to input dataset JSON file
    #[clap(long)]
    input: String,

    /// Output directory for results
    #[clap(long, default_value = "aggregation_results")]
    output_dir: String,

    /// Optional JSON file with a full aggregation config
    #[clap(long)]
    config: Option<String>,

    /// Aggregation strategy: hierarchical, kmeans or spectral
    #[clap(long)]
    strategy: Option<String>,

    /// Linkage for hierarchical merging: single, complete, average or centroid
    #[clap(long)]
    linkage: Option<String>,

    /// Dissimilarity used for zero or missing connectivity
    #[clap(long)]
    connectivity_cap: Option<f64>,

    /// Only produce these cluster counts (comma separated)
    #[clap(long, value_delimiter = ',')]
    clusters: Vec<usize>,

    /// Seed for centroid-based initialisation
    #[clap(long)]
    seed: Option<u64>,

    /// Group regions by the n-th separator token of their id instead of clustering
    #[clap(long)]
    group_by_token: Option<usize>,

    /// Skip diagnostic exports
    #[clap(long)]
    skip_viz: bool,

    /// Number of worker threads (0 = use all available cores)
    #[clap(long, default_value = "0")]
    threads: usize,

    /// Verbose logging
    #[clap(long, short)]
    verbose: bool,
}

impl Cli {
    /// Config file first, then command line overrides
    fn aggregation_config(&self) -> Result<AggregationConfig> {
        let mut config = match &self.config {
            Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
            None => AggregationConfig::default(),
        };

        if let Some(strategy) = &self.strategy {
            config.strategy = strategy.parse::<AggregationStrategy>()?;
        }
        if let Some(linkage) = &self.linkage {
            config.linkage = linkage.parse::<Linkage>()?;
        }
        if let Some(cap) = self.connectivity_cap {
            config.connectivity_cap = cap;
        }
        if !self.clusters.is_empty() {
            config.cluster_counts = Some(self.clusters.clone());
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }

        Ok(config)
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Cli::parse();

    // Configure logging
    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp_millis()
        .init();

    // Set number of threads
    let num_threads = if args.threads > 0 {
        args.threads
    } else {
        num_cpus::get()
    };

    log::info!("Using {} worker threads", num_threads);
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()?;

    let config = args.aggregation_config()?;

    log::info!("Starting region aggregation");
    log::info!("Input: {}", args.input);
    log::info!("Output: {}", args.output_dir);

    // 1. Load data
    let dataset = load_dataset(&args.input)?;

    // 2. Aggregate
    let outcome = match args.group_by_token {
        Some(position) => {
            let level = group_by_id_token(dataset.region_ids(), &config.label_separator, position);
            let mut hierarchy = AggregationHierarchy::new(dataset.region_ids().to_vec(), false);
            hierarchy.insert(level);
            AggregationOutcome {
                hierarchy,
                merge_tree: None,
                diagnostics: Diagnostics::default(),
            }
        }
        None => aggregate(&dataset, &config)?,
    };

    // 3. Save results
    storage::save_results(&outcome, &dataset, &config, &args.output_dir)?;

    // 4. Export diagnostics if requested
    if !args.skip_viz {
        viz::generate_visualizations(
            outcome.merge_tree.as_ref(),
            &outcome.diagnostics.distortion,
            dataset.region_ids(),
            &args.output_dir,
        )?;
    }

    log::info!("Aggregation complete. Results saved to {}", args.output_dir);

    Ok(())
}
