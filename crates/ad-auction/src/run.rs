use {
    crate::{
        arguments::Arguments,
        config::Configuration,
        domain::PayloadGenerator,
        infra::{filter::DeniedOwners, storage::JsonFile},
    },
    buyer_input::Payload,
    clap::Parser,
    std::sync::Arc,
};

pub async fn start(args: impl Iterator<Item = String>) {
    let args = Arguments::parse_from(args);
    let obs_config = observe::Config::new(
        &args.log_filter,
        Some(args.log_stderr_threshold),
        args.use_json_logs,
    );
    observe::tracing::initialize(&obs_config);
    tracing::info!("running ad-auction with validated arguments:\n{}", args);
    observe::metrics::setup_registry(Some("ad_auction".into()), None);

    if let Err(err) = run(args).await {
        tracing::error!(?err, "dry run failed");
        std::process::exit(1);
    }
}

/// Packs the candidates of every buyer in the candidates file into a single
/// payload and reports its size. Assumes tracing and the metrics registry have
/// already been set up.
pub async fn run(args: Arguments) -> anyhow::Result<()> {
    let config = Configuration::from_path(&args.config).await?.validate()?;
    let storage = Arc::new(JsonFile::load(&args.candidates).await?);
    let buyers = storage.buyers();

    let generator = PayloadGenerator::new(
        storage,
        Arc::new(DeniedOwners(config.auction.denied_owners.clone())),
        &config.payload,
        config.auction.candidate_active_window,
    );
    let payload = generator.generate(&buyers, "dry-run").await?;
    report(&payload, config.payload.max_size_bytes);

    match observe::metrics::encode(observe::metrics::get_registry()) {
        Ok(metrics) => tracing::debug!("metrics:\n{metrics}"),
        Err(err) => tracing::warn!(?err, "failed to encode metrics"),
    }
    Ok(())
}

fn report(payload: &Payload, max_size: usize) {
    for (buyer, data) in &payload.buyers {
        let stats = payload.stats.get(buyer).copied().unwrap_or_default();
        tracing::info!(
            %buyer,
            size = data.len(),
            version = %data.version,
            candidates = stats.candidates,
            ads = stats.ads,
            signals = stats.signals,
            "buyer payload"
        );
    }
    tracing::info!(
        status = <&'static str>::from(payload.status),
        size = payload.total_size(),
        max_size,
        recalculations = payload.recalculations,
        "packed payload"
    );
}
