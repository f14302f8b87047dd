use {
    super::{AuctionParameters, AuctionWinner, Error, ReportingContext, ScoredBid},
    crate::{
        config,
        infra::{
            ActiveWindow,
            BiddingSignals,
            CandidateFilter,
            ScoringSignals,
            ScriptEngine,
            ScriptFailure,
            Storage,
        },
    },
    futures::{StreamExt, stream},
    indexmap::IndexMap,
    model::{AdWithBid, BidResult, BuyerId, Candidate},
    observe::future::Measure,
    std::{
        num::NonZeroUsize,
        sync::{
            Arc,
            atomic::{AtomicU64, Ordering},
        },
        time::Duration,
    },
    tracing::Instrument,
    winner_selection::{
        Arbitrator,
        Participant,
        RankedItem,
        RankedParticipant,
        Scored,
        UnscoredItem,
    },
};

static NEXT_AUCTION_ID: AtomicU64 = AtomicU64::new(0);

/// Runs on-device auctions through the stages
/// collect, filter, bid, score, select winner and persist.
pub struct Orchestrator {
    storage: Arc<dyn Storage>,
    filter: Arc<dyn CandidateFilter>,
    engine: Arc<dyn ScriptEngine>,
    arbitrator: Arbitrator,
    config: config::Auction,
}

impl Orchestrator {
    pub fn new(
        storage: Arc<dyn Storage>,
        filter: Arc<dyn CandidateFilter>,
        engine: Arc<dyn ScriptEngine>,
        config: config::Auction,
    ) -> Self {
        Self {
            storage,
            filter,
            engine,
            arbitrator: Arbitrator,
            config,
        }
    }

    /// Runs a single auction under the configured overall deadline.
    ///
    /// Once the deadline expires no further stage is started. Bidding tasks
    /// that are still running get detached and their results are dropped.
    pub async fn run_auction(&self, params: AuctionParameters) -> Result<AuctionWinner, Error> {
        let id = NEXT_AUCTION_ID.fetch_add(1, Ordering::Relaxed);
        let result = tokio::time::timeout(self.config.overall_timeout, self.run(&params))
            .instrument(tracing::info_span!("auction", id))
            .await
            .unwrap_or(Err(Error::Timeout));

        let label = match &result {
            Ok(_) => "won",
            Err(err) => err.label(),
        };
        Metrics::get().auctions.with_label_values(&[label]).inc();
        match &result {
            Ok(winner) => tracing::info!(
                id,
                buyer = %winner.winner.bid.buyer,
                bid = winner.winner.bid.bid,
                score = winner.winner.score,
                "auction finished"
            ),
            Err(err) => tracing::info!(id, %err, "auction finished without winner"),
        }
        result
    }

    async fn run(&self, params: &AuctionParameters) -> Result<AuctionWinner, Error> {
        let metrics = Metrics::get();

        let candidates = self
            .collect(params)
            .measure(&metrics.stage_duration, "collect")
            .await?;
        let candidates = self.filter.filter(candidates);
        tracing::debug!(candidates = candidates.len(), "filtered candidates");

        let bids = self
            .bid(candidates, params)
            .measure(&metrics.stage_duration, "bid")
            .await?;
        let scored = self
            .score(bids, params)
            .measure(&metrics.stage_duration, "score")
            .await?;
        let winner = self.select_winner(scored)?;

        let context = ReportingContext::new(&params.seller, &winner);
        self.storage
            .persist_winner(&winner, &context)
            .measure(&metrics.stage_duration, "persist")
            .await
            .map_err(Error::Persistence)?;
        Ok(winner)
    }

    async fn collect(&self, params: &AuctionParameters) -> Result<Vec<Candidate>, Error> {
        let window = ActiveWindow::ending_now(self.config.candidate_active_window);
        let candidates = self
            .storage
            .fetch_candidates(&params.buyers, window)
            .await
            .map_err(Error::CandidateFetch)?;
        tracing::debug!(
            buyers = params.buyers.len(),
            candidates = candidates.len(),
            "collected candidates"
        );
        if candidates.is_empty() && params.contextual_bids.is_empty() {
            return Err(Error::NoCandidates);
        }
        Ok(candidates)
    }

    /// Bids for every candidate with one task per buyer. A failing buyer
    /// only loses its own bids unless every buyer fails.
    async fn bid(
        &self,
        candidates: Vec<Candidate>,
        params: &AuctionParameters,
    ) -> Result<Vec<BidResult>, Error> {
        let mut groups: IndexMap<BuyerId, Vec<Candidate>> = IndexMap::new();
        for candidate in candidates {
            groups
                .entry(candidate.buyer.clone())
                .or_default()
                .push(candidate);
        }
        if groups.is_empty() {
            return Ok(Vec::new());
        }

        let total = groups.len();
        let outcomes: Vec<_> = stream::iter(groups)
            .map(|(buyer, group)| {
                let signals = BiddingSignals {
                    seller: params.seller.clone(),
                    auction_signals: params.auction_signals.clone(),
                    per_buyer_signals: params.per_buyer_signals.get(&buyer).cloned(),
                };
                let task = tokio::spawn(
                    bid_group(
                        Arc::clone(&self.engine),
                        group,
                        signals,
                        self.config.bidding_timeout_per_candidate,
                    )
                    .instrument(tracing::debug_span!("buyer", %buyer)),
                );
                async move { (buyer, task.await) }
            })
            .buffered(self.pool_size())
            .collect()
            .await;

        let mut bids = Vec::new();
        let mut failed = 0;
        for (buyer, outcome) in outcomes {
            match outcome {
                Ok(Ok(group_bids)) => bids.extend(group_bids),
                Ok(Err(err)) => {
                    failed += 1;
                    tracing::debug!(%buyer, %err, "buyer failed to bid");
                }
                Err(err) => {
                    failed += 1;
                    tracing::warn!(%buyer, ?err, "bidding task failed");
                }
            }
        }
        if failed == total && params.contextual_bids.is_empty() {
            return Err(Error::NoValidBids);
        }
        Ok(bids)
    }

    async fn score(
        &self,
        bids: Vec<BidResult>,
        params: &AuctionParameters,
    ) -> Result<Vec<Participant<BidResult, Scored<f64>>>, Error> {
        let bids: Vec<_> = bids
            .into_iter()
            .chain(params.contextual_bids.iter().cloned())
            .filter(BidResult::is_eligible)
            .collect();
        if bids.is_empty() {
            return Err(Error::NoValidBids);
        }

        let signals = ScoringSignals {
            seller: params.seller.clone(),
            auction_signals: params.auction_signals.clone(),
            seller_signals: params.seller_signals.clone(),
        };
        let scores = tokio::time::timeout(
            self.config.scoring_timeout,
            self.engine.score(&bids, &signals),
        )
        .await
        .map_err(|_| Error::Timeout)??;
        if scores.len() != bids.len() {
            return Err(ScriptFailure::InvalidOutput(format!(
                "{} scores for {} bids",
                scores.len(),
                bids.len()
            ))
            .into());
        }

        Ok(bids
            .into_iter()
            .zip(scores)
            .map(|(bid, score)| Participant::new(bid).with_score(score))
            .collect())
    }

    fn select_winner(
        &self,
        scored: Vec<Participant<BidResult, Scored<f64>>>,
    ) -> Result<AuctionWinner, Error> {
        let ranking = self.arbitrator.arbitrate(scored);
        let rejected = ranking.filtered_out().count();
        if rejected > 0 {
            tracing::debug!(rejected, "bids without a positive score");
        }
        let (winner, runner_up) = ranking.into_winners();
        let winner = winner.ok_or(Error::NoWinner)?;
        Ok(AuctionWinner {
            winner: into_scored_bid(winner),
            runner_up: runner_up.map(into_scored_bid),
        })
    }

    fn pool_size(&self) -> usize {
        let available = std::thread::available_parallelism().map_or(1, NonZeroUsize::get);
        self.config.concurrent_bidding_count.min(available).max(1)
    }
}

fn into_scored_bid(participant: RankedParticipant<BidResult>) -> ScoredBid {
    let score = RankedItem::score(&participant);
    ScoredBid {
        bid: participant.into_item(),
        score,
    }
}

#[derive(Debug, thiserror::Error)]
enum BidFailure {
    #[error(transparent)]
    Script(#[from] ScriptFailure),
    #[error("bidding timed out")]
    Timeout,
}

/// Bids for all candidates of a single buyer in order. Fails only if every
/// attempted candidate failed.
async fn bid_group(
    engine: Arc<dyn ScriptEngine>,
    group: Vec<Candidate>,
    signals: BiddingSignals,
    timeout: Duration,
) -> Result<Vec<BidResult>, BidFailure> {
    let metrics = Metrics::get();
    let mut bids = Vec::new();
    let mut attempted = 0;
    let mut failed = 0;
    let mut last_failure = None;

    for candidate in group {
        if candidate.ads.is_empty() {
            tracing::trace!(candidate = %candidate.name, "skipping candidate without ads");
            metrics.bids.with_label_values(&["no_ads"]).inc();
            continue;
        }
        attempted += 1;

        let outcome = tokio::time::timeout(timeout, engine.bid(&candidate, &signals))
            .await
            .map_err(|_| BidFailure::Timeout)
            .and_then(|result| result.map_err(BidFailure::from));
        match outcome {
            Ok(ads) => match best_ad(ads) {
                Some(ad) => {
                    metrics.bids.with_label_values(&["ok"]).inc();
                    bids.push(BidResult::new(
                        candidate.buyer.clone(),
                        Some(candidate.name.clone()),
                        ad,
                    ));
                }
                None => {
                    metrics.bids.with_label_values(&["no_bid"]).inc();
                    tracing::trace!(candidate = %candidate.name, "no eligible bid");
                }
            },
            Err(err) => {
                let label = match err {
                    BidFailure::Script(_) => "script_failure",
                    BidFailure::Timeout => "timeout",
                };
                metrics.bids.with_label_values(&[label]).inc();
                tracing::debug!(candidate = %candidate.name, %err, "candidate failed to bid");
                failed += 1;
                last_failure = Some(err);
            }
        }
    }

    match last_failure {
        Some(err) if failed == attempted => Err(err),
        _ => Ok(bids),
    }
}

/// The highest eligible bid of a candidate. Ties go to the ad listed first.
fn best_ad(ads: Vec<AdWithBid>) -> Option<AdWithBid> {
    ads.into_iter()
        .filter(AdWithBid::is_eligible)
        .reduce(|best, ad| if ad.bid > best.bid { ad } else { best })
}

#[derive(prometheus_metric_storage::MetricStorage)]
#[metric(subsystem = "ad_auction")]
struct Metrics {
    /// Time spent in each auction stage.
    #[metric(labels("stage"), buckets(0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1, 2.5, 5, 10))]
    stage_duration: prometheus::HistogramVec,

    /// Outcome of every candidate bid.
    #[metric(labels("result"))]
    bids: prometheus::IntCounterVec,

    /// Outcome of every auction.
    #[metric(labels("result"))]
    auctions: prometheus::IntCounterVec,
}

impl Metrics {
    fn get() -> &'static Self {
        Metrics::instance(observe::metrics::get_storage_registry())
            .expect("unexpected error getting metrics instance")
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::infra::{MockCandidateFilter, MockScriptEngine, MockStorage, filter::DeniedOwners},
        maplit::hashmap,
        model::Ad,
    };

    const BUYERS: [&str; 3] = ["a.example", "b.example", "c.example"];

    fn candidate(buyer: &str, name: &str) -> Candidate {
        Candidate {
            owner: "app".into(),
            buyer: buyer.into(),
            name: name.into(),
            ads: vec![Ad {
                render_id: format!("{buyer}/{name}"),
                ..Default::default()
            }],
            trusted_bidding_keys: vec![],
            user_bidding_signals: String::new(),
            priority: 0.,
            omit_ads: false,
        }
    }

    fn ad_bid(candidate: &Candidate, bid: f64) -> AdWithBid {
        AdWithBid {
            ad: candidate.ads[0].clone(),
            bid,
            ..Default::default()
        }
    }

    fn params() -> AuctionParameters {
        AuctionParameters {
            seller: "seller.example".into(),
            buyers: BUYERS.iter().map(|buyer| BuyerId::from(*buyer)).collect(),
            ..Default::default()
        }
    }

    fn storage(candidates: Vec<Candidate>) -> MockStorage {
        let mut storage = MockStorage::new();
        storage
            .expect_fetch_candidates()
            .returning(move |_, _| Ok(candidates.clone()));
        storage
    }

    fn persisting(mut storage: MockStorage) -> MockStorage {
        storage.expect_persist_winner().returning(|_, _| Ok(()));
        storage
    }

    /// Bids a fixed amount per candidate name. Scores equal bids.
    fn engine(bids: Vec<(&'static str, f64)>) -> MockScriptEngine {
        let mut engine = MockScriptEngine::new();
        engine.expect_bid().returning(move |candidate, _| {
            Ok(bids
                .iter()
                .filter(|(name, _)| *name == candidate.name)
                .map(|(_, bid)| ad_bid(candidate, *bid))
                .collect())
        });
        engine
            .expect_score()
            .returning(|bids, _| Ok(bids.iter().map(|bid| bid.bid).collect()));
        engine
    }

    fn orchestrator(
        storage: MockStorage,
        filter: impl CandidateFilter + 'static,
        engine: impl ScriptEngine + 'static,
    ) -> Orchestrator {
        Orchestrator::new(
            Arc::new(storage),
            Arc::new(filter),
            Arc::new(engine),
            config::Auction::default(),
        )
    }

    #[tokio::test]
    async fn no_candidates() {
        let orchestrator = orchestrator(
            storage(vec![]),
            DeniedOwners::default(),
            MockScriptEngine::new(),
        );
        let result = orchestrator.run_auction(params()).await;
        assert!(matches!(result, Err(Error::NoCandidates)));
    }

    #[tokio::test]
    async fn highest_score_wins_and_is_persisted() {
        let mut storage = MockStorage::new();
        storage
            .expect_fetch_candidates()
            .withf(|buyers, _| buyers.len() == 3)
            .returning(|_, _| {
                Ok(vec![
                    candidate("a.example", "a"),
                    candidate("b.example", "b"),
                    candidate("c.example", "c"),
                ])
            });
        storage
            .expect_persist_winner()
            .times(1)
            .withf(|winner, context| {
                winner.winner.bid.buyer == BuyerId::from("b.example")
                    && context.seller == "seller.example"
                    && context.render_id == "b.example/b"
                    && context.winning_bid == 3.
                    && context.runner_up_score == Some(2.)
            })
            .returning(|_, _| Ok(()));

        let orchestrator = orchestrator(
            storage,
            DeniedOwners::default(),
            engine(vec![("a", 1.), ("b", 3.), ("c", 2.)]),
        );
        let winner = orchestrator.run_auction(params()).await.unwrap();
        assert_eq!(winner.winner.score, 3.);
        assert_eq!(winner.winner.bid.candidate.as_deref(), Some("b"));
        assert_eq!(
            winner.runner_up.map(|runner_up| runner_up.bid.buyer),
            Some(BuyerId::from("c.example"))
        );
    }

    #[tokio::test]
    async fn ties_go_to_the_first_buyer() {
        let candidates = vec![candidate("a.example", "a"), candidate("b.example", "b")];
        for _ in 0..5 {
            let orchestrator = orchestrator(
                persisting(storage(candidates.clone())),
                DeniedOwners::default(),
                engine(vec![("a", 2.), ("b", 2.)]),
            );
            let winner = orchestrator.run_auction(params()).await.unwrap();
            assert_eq!(winner.winner.bid.buyer, BuyerId::from("a.example"));
        }
    }

    #[tokio::test]
    async fn picks_the_best_ad_of_a_candidate() {
        let mut engine = MockScriptEngine::new();
        engine.expect_bid().returning(|_, _| {
            let ad = |render_id: &str, bid| AdWithBid {
                ad: Ad {
                    render_id: render_id.into(),
                    ..Default::default()
                },
                bid,
                ..Default::default()
            };
            Ok(vec![
                ad("low", 1.),
                ad("nan", f64::NAN),
                ad("first", 5.),
                ad("negative", -10.),
                ad("second", 5.),
            ])
        });
        engine
            .expect_score()
            .withf(|bids, _| bids.len() == 1)
            .returning(|bids, _| Ok(bids.iter().map(|bid| bid.bid).collect()));

        let orchestrator = orchestrator(
            persisting(storage(vec![candidate("a.example", "a")])),
            DeniedOwners::default(),
            engine,
        );
        let winner = orchestrator.run_auction(params()).await.unwrap();
        assert_eq!(winner.winner.bid.ad.render_id, "first");
        assert!(winner.runner_up.is_none());
    }

    #[tokio::test]
    async fn failing_buyer_does_not_abort_others() {
        let mut engine = MockScriptEngine::new();
        engine.expect_bid().returning(|candidate, _| {
            if candidate.buyer == BuyerId::from("a.example") {
                Err(ScriptFailure::Failure("boom".into()))
            } else {
                Ok(vec![ad_bid(candidate, 1.)])
            }
        });
        engine
            .expect_score()
            .returning(|bids, _| Ok(bids.iter().map(|bid| bid.bid).collect()));

        let orchestrator = orchestrator(
            persisting(storage(vec![
                candidate("a.example", "a1"),
                candidate("a.example", "a2"),
                candidate("b.example", "b"),
            ])),
            DeniedOwners::default(),
            engine,
        );
        let winner = orchestrator.run_auction(params()).await.unwrap();
        assert_eq!(winner.winner.bid.buyer, BuyerId::from("b.example"));
    }

    #[tokio::test]
    async fn every_buyer_failing_means_no_valid_bids() {
        let mut engine = MockScriptEngine::new();
        engine
            .expect_bid()
            .returning(|_, _| Err(ScriptFailure::InvalidOutput("not a bid".into())));
        let orchestrator = orchestrator(
            storage(vec![candidate("a.example", "a"), candidate("b.example", "b")]),
            DeniedOwners::default(),
            engine,
        );
        let result = orchestrator.run_auction(params()).await;
        assert!(matches!(result, Err(Error::NoValidBids)));
    }

    #[tokio::test]
    async fn filtered_out_candidates_mean_no_valid_bids() {
        let mut filter = MockCandidateFilter::new();
        filter.expect_filter().times(1).returning(|_| vec![]);
        let orchestrator = orchestrator(
            storage(vec![candidate("a.example", "a")]),
            filter,
            MockScriptEngine::new(),
        );
        let result = orchestrator.run_auction(params()).await;
        assert!(matches!(result, Err(Error::NoValidBids)));
    }

    #[tokio::test]
    async fn denied_owners_never_bid() {
        let mut blocked = candidate("a.example", "blocked");
        blocked.owner = "blocked.app".into();
        let orchestrator = orchestrator(
            persisting(storage(vec![blocked, candidate("b.example", "b")])),
            DeniedOwners(vec!["blocked.app".into()]),
            engine(vec![("blocked", 10.), ("b", 1.)]),
        );
        let winner = orchestrator.run_auction(params()).await.unwrap();
        assert_eq!(winner.winner.bid.candidate.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn contextual_bids_are_scored_with_candidate_bids() {
        let contextual = |bid| BidResult {
            buyer: "contextual.example".into(),
            candidate: None,
            ad: Ad::default(),
            bid,
            ad_cost: None,
            debug_report: Default::default(),
        };
        let mut failing = MockScriptEngine::new();
        failing
            .expect_bid()
            .returning(|_, _| Err(ScriptFailure::Failure("boom".into())));
        failing
            .expect_score()
            .withf(|bids, _| bids.len() == 1)
            .returning(|bids, _| Ok(bids.iter().map(|bid| bid.bid).collect()));

        let mixed = AuctionParameters {
            contextual_bids: vec![contextual(-1.), contextual(4.)],
            ..params()
        };
        let only_contextual = AuctionParameters {
            contextual_bids: vec![contextual(4.)],
            ..params()
        };

        let winner = orchestrator(
            persisting(storage(vec![candidate("a.example", "a")])),
            DeniedOwners::default(),
            failing,
        )
        .run_auction(mixed)
        .await
        .unwrap();
        assert_eq!(winner.winner.bid.buyer, BuyerId::from("contextual.example"));
        assert_eq!(winner.winner.bid.candidate, None);

        // Contextual bids alone are enough to run an auction.
        let result = orchestrator(
            persisting(storage(vec![])),
            DeniedOwners::default(),
            engine(vec![]),
        )
        .run_auction(only_contextual)
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn non_positive_scores_never_win() {
        let mut engine = MockScriptEngine::new();
        engine
            .expect_bid()
            .returning(|candidate, _| Ok(vec![ad_bid(candidate, 1.)]));
        engine.expect_score().returning(|_, _| Ok(vec![0., -1.]));

        let orchestrator = orchestrator(
            storage(vec![candidate("a.example", "a"), candidate("b.example", "b")]),
            DeniedOwners::default(),
            engine,
        );
        let result = orchestrator.run_auction(params()).await;
        assert!(matches!(result, Err(Error::NoWinner)));
    }

    #[tokio::test]
    async fn score_count_must_match_bids() {
        let mut engine = MockScriptEngine::new();
        engine
            .expect_bid()
            .returning(|candidate, _| Ok(vec![ad_bid(candidate, 1.)]));
        engine.expect_score().returning(|_, _| Ok(vec![1.]));

        let orchestrator = orchestrator(
            storage(vec![candidate("a.example", "a"), candidate("b.example", "b")]),
            DeniedOwners::default(),
            engine,
        );
        let result = orchestrator.run_auction(params()).await;
        assert!(matches!(
            result,
            Err(Error::Script(ScriptFailure::InvalidOutput(_)))
        ));
    }

    #[tokio::test]
    async fn persistence_failures_are_surfaced() {
        let mut storage = storage(vec![candidate("a.example", "a")]);
        storage
            .expect_persist_winner()
            .times(1)
            .returning(|_, _| Err(anyhow::anyhow!("disk full")));

        let orchestrator = orchestrator(storage, DeniedOwners::default(), engine(vec![("a", 1.)]));
        let result = orchestrator.run_auction(params()).await;
        assert!(matches!(result, Err(Error::Persistence(_))));
    }

    #[tokio::test]
    async fn fetch_failures_are_surfaced() {
        let mut storage = MockStorage::new();
        storage
            .expect_fetch_candidates()
            .returning(|_, _| Err(anyhow::anyhow!("unavailable")));
        let orchestrator = orchestrator(storage, DeniedOwners::default(), MockScriptEngine::new());
        let result = orchestrator.run_auction(params()).await;
        assert!(matches!(result, Err(Error::CandidateFetch(_))));
    }

    #[tokio::test]
    async fn candidates_without_ads_are_skipped() {
        let mut empty = candidate("a.example", "empty");
        empty.ads.clear();

        let mut engine = MockScriptEngine::new();
        engine
            .expect_bid()
            .times(1)
            .withf(|candidate, _| candidate.name == "a")
            .returning(|candidate, _| Ok(vec![ad_bid(candidate, 1.)]));
        engine
            .expect_score()
            .returning(|bids, _| Ok(bids.iter().map(|bid| bid.bid).collect()));

        let orchestrator = orchestrator(
            persisting(storage(vec![empty, candidate("a.example", "a")])),
            DeniedOwners::default(),
            engine,
        );
        assert!(orchestrator.run_auction(params()).await.is_ok());
    }

    #[tokio::test]
    async fn bidding_signals_are_per_buyer() {
        let mut engine = MockScriptEngine::new();
        engine
            .expect_bid()
            .withf(|candidate, signals| {
                signals.seller == "seller.example"
                    && match candidate.buyer.0.as_str() {
                        "a.example" => signals.per_buyer_signals == Some(serde_json::json!(1)),
                        _ => signals.per_buyer_signals.is_none(),
                    }
            })
            .returning(|candidate, _| Ok(vec![ad_bid(candidate, 1.)]));
        engine
            .expect_score()
            .withf(|_, signals| signals.seller_signals == serde_json::json!("seller"))
            .returning(|bids, _| Ok(bids.iter().map(|bid| bid.bid).collect()));

        let params = AuctionParameters {
            seller_signals: serde_json::json!("seller"),
            per_buyer_signals: hashmap! { "a.example".into() => serde_json::json!(1) },
            ..params()
        };
        let orchestrator = orchestrator(
            persisting(storage(vec![candidate("a.example", "a"), candidate("b.example", "b")])),
            DeniedOwners::default(),
            engine,
        );
        assert!(orchestrator.run_auction(params).await.is_ok());
    }

    /// Takes its time for the configured candidates and when scoring.
    struct SlowEngine {
        slow_candidates: Vec<&'static str>,
        bid_delay: Duration,
        score_delay: Duration,
    }

    #[async_trait::async_trait]
    impl ScriptEngine for SlowEngine {
        async fn bid(
            &self,
            candidate: &Candidate,
            _: &BiddingSignals,
        ) -> Result<Vec<AdWithBid>, ScriptFailure> {
            if self.slow_candidates.contains(&candidate.name.as_str()) {
                tokio::time::sleep(self.bid_delay).await;
            }
            Ok(vec![ad_bid(candidate, 1.)])
        }

        async fn score(
            &self,
            bids: &[BidResult],
            _: &ScoringSignals,
        ) -> Result<Vec<f64>, ScriptFailure> {
            tokio::time::sleep(self.score_delay).await;
            Ok(bids.iter().map(|bid| bid.bid).collect())
        }
    }

    fn timed(
        storage: MockStorage,
        engine: SlowEngine,
        configure: impl FnOnce(&mut config::Auction),
    ) -> Orchestrator {
        let mut config = config::Auction::default();
        configure(&mut config);
        Orchestrator::new(
            Arc::new(storage),
            Arc::new(DeniedOwners::default()),
            Arc::new(engine),
            config,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn overall_deadline_stops_the_auction() {
        // Persisting would panic as there is no expectation for it.
        let orchestrator = timed(
            storage(vec![candidate("a.example", "a")]),
            SlowEngine {
                slow_candidates: vec!["a"],
                bid_delay: Duration::from_secs(20),
                score_delay: Duration::ZERO,
            },
            |config| {
                config.overall_timeout = Duration::from_secs(10);
                config.bidding_timeout_per_candidate = Duration::from_secs(30);
            },
        );
        let result = orchestrator.run_auction(params()).await;
        assert!(matches!(result, Err(Error::Timeout)));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_candidates_lose_their_bid() {
        let orchestrator = timed(
            persisting(storage(vec![
                candidate("a.example", "slow"),
                candidate("a.example", "fast"),
            ])),
            SlowEngine {
                slow_candidates: vec!["slow"],
                bid_delay: Duration::from_secs(10),
                score_delay: Duration::ZERO,
            },
            |config| config.bidding_timeout_per_candidate = Duration::from_secs(1),
        );
        let winner = orchestrator.run_auction(params()).await.unwrap();
        assert_eq!(winner.winner.bid.candidate.as_deref(), Some("fast"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_scoring_times_out() {
        let orchestrator = timed(
            storage(vec![candidate("a.example", "a")]),
            SlowEngine {
                slow_candidates: vec![],
                bid_delay: Duration::ZERO,
                score_delay: Duration::from_secs(10),
            },
            |config| {
                config.overall_timeout = Duration::from_secs(30);
                config.scoring_timeout = Duration::from_secs(1);
            },
        );
        let result = orchestrator.run_auction(params()).await;
        assert!(matches!(result, Err(Error::Timeout)));
    }

    /// Records how many bids are in flight at the same time.
    #[derive(Default)]
    struct ConcurrencyTracker {
        running: std::sync::atomic::AtomicUsize,
        peak: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ScriptEngine for ConcurrencyTracker {
        async fn bid(
            &self,
            candidate: &Candidate,
            _: &BiddingSignals,
        ) -> Result<Vec<AdWithBid>, ScriptFailure> {
            let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(running, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![ad_bid(candidate, 1.)])
        }

        async fn score(
            &self,
            bids: &[BidResult],
            _: &ScoringSignals,
        ) -> Result<Vec<f64>, ScriptFailure> {
            Ok(bids.iter().map(|bid| bid.bid).collect())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn bidding_pool_is_bounded() {
        let candidates: Vec<_> = (0..10)
            .map(|i| candidate(&format!("b{i}.example"), &format!("c{i}")))
            .collect();
        let available = std::thread::available_parallelism().map_or(1, NonZeroUsize::get);

        for concurrent in [1, 2] {
            let engine = Arc::new(ConcurrencyTracker::default());
            let orchestrator = Orchestrator::new(
                Arc::new(persisting(storage(candidates.clone()))),
                Arc::new(DeniedOwners::default()),
                engine.clone(),
                config::Auction {
                    concurrent_bidding_count: concurrent,
                    ..Default::default()
                },
            );

            let winner = orchestrator.run_auction(params()).await.unwrap();
            // Equal bids so the first buyer in order wins.
            assert_eq!(winner.winner.bid.buyer, BuyerId::from("b0.example"));

            let peak = engine.peak.load(Ordering::SeqCst);
            assert!(peak >= 1);
            assert!(peak <= concurrent.min(available));
        }
    }

    #[test]
    fn best_ad_prefers_first_of_equal_bids() {
        let ad = |render_id: &str, bid| AdWithBid {
            ad: Ad {
                render_id: render_id.into(),
                ..Default::default()
            },
            bid,
            ..Default::default()
        };
        let best = best_ad(vec![ad("a", 2.), ad("b", 3.), ad("c", 3.)]).unwrap();
        assert_eq!(best.ad.render_id, "b");
        assert!(best_ad(vec![ad("negative", -1.)]).is_none());
        assert!(best_ad(vec![]).is_none());
    }
}
