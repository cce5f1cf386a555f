//! Recommend command implementation for the café CLI.

use std::io::{BufReader, Write};
use std::sync::Arc;

use cafe_core::Gazetteer;
use cafe_data::gemini::{GeminiConfig, GeminiEmbedder, GeminiIntentClassifier};
use cafe_data::{ResilientEmbedder, SqliteLedger, load_gazetteer, load_store};
use cafe_engine::{
    FollowUp, RecommendRequest, Recommender, RecommenderConfig, Response, TagTaxonomy,
};
use cafe_scorer::ScoringConfig;
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};
use clap::Parser;
use geo::Point;
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_GAZETTEER, ARG_LEDGER, ARG_REVIEWS, ARG_SCORING_CONFIG, ARG_USER, ARG_VENUES, CliError,
    DEFAULT_LEDGER, ENV_RECOMMEND_USER, ENV_RECOMMEND_VENUES, write_json,
};

/// CLI arguments for the `recommend` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Recommend cafés for one request. Venues and reviews are \
                 loaded from JSON snapshots, feedback is read from and \
                 written to a SQLite ledger, and the answer is printed as \
                 JSON. Without a Gemini API key the engine skips semantic \
                 search and intent classification.",
    about = "Recommend cafés near a place"
)]
#[ortho_config(prefix = "CAFE")]
pub(crate) struct RecommendArgs {
    /// Free-text request, e.g. "quiet café near Ximen with sockets".
    #[arg(value_name = "text")]
    #[serde(default)]
    pub(crate) query: Option<String>,
    /// Path to the venue snapshot (JSON array).
    #[arg(long = ARG_VENUES, value_name = "path")]
    #[serde(default)]
    pub(crate) venues: Option<Utf8PathBuf>,
    /// Path to the review snapshot (JSON array).
    #[arg(long = ARG_REVIEWS, value_name = "path")]
    #[serde(default)]
    pub(crate) reviews: Option<Utf8PathBuf>,
    /// Path to the gazetteer of stations and districts.
    #[arg(long = ARG_GAZETTEER, value_name = "path")]
    #[serde(default)]
    pub(crate) gazetteer: Option<Utf8PathBuf>,
    /// Path to the SQLite feedback ledger; created when missing.
    #[arg(long = ARG_LEDGER, value_name = "path")]
    #[serde(default)]
    pub(crate) ledger: Option<Utf8PathBuf>,
    /// Identifier of the requesting user.
    #[arg(long = ARG_USER, value_name = "id")]
    #[serde(default)]
    pub(crate) user: Option<String>,
    /// Latitude of the user.
    #[arg(long, value_name = "degrees", allow_negative_numbers = true)]
    #[serde(default)]
    pub(crate) lat: Option<f64>,
    /// Longitude of the user.
    #[arg(long, value_name = "degrees", allow_negative_numbers = true)]
    #[serde(default)]
    pub(crate) lng: Option<f64>,
    /// Feature tag or quick-reply label; repeat for more.
    #[arg(long = "tag", value_name = "tag")]
    #[serde(default)]
    pub(crate) tags: Vec<String>,
    /// Venue the user just turned down.
    #[arg(long = "rejected-place", value_name = "id")]
    #[serde(default)]
    pub(crate) rejected_place: Option<String>,
    /// Reason the user gave for turning it down.
    #[arg(long = "avoid", value_name = "reason", requires = "rejected_place")]
    #[serde(default)]
    pub(crate) avoid: Option<String>,
    /// JSON file overriding the ranking constants.
    #[arg(long = ARG_SCORING_CONFIG, value_name = "path")]
    #[serde(default)]
    pub(crate) scoring_config: Option<Utf8PathBuf>,
    /// Gemini API key enabling semantic search and intent classification.
    #[arg(long = "gemini-api-key", value_name = "key")]
    #[serde(default)]
    pub(crate) gemini_api_key: Option<String>,
}

impl RecommendArgs {
    pub(crate) fn into_config(self) -> Result<RecommendConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        RecommendConfig::try_from(merged)
    }
}

/// Resolved `recommend` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RecommendConfig {
    pub(crate) venues: Utf8PathBuf,
    pub(crate) reviews: Option<Utf8PathBuf>,
    pub(crate) gazetteer: Option<Utf8PathBuf>,
    pub(crate) ledger: Utf8PathBuf,
    pub(crate) scoring_config: Option<Utf8PathBuf>,
    pub(crate) gemini_api_key: Option<String>,
    pub(crate) request: RecommendRequest,
}

impl RecommendConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        require_file(&self.venues, ARG_VENUES)?;
        if let Some(path) = &self.reviews {
            require_file(path, ARG_REVIEWS)?;
        }
        if let Some(path) = &self.gazetteer {
            require_file(path, ARG_GAZETTEER)?;
        }
        if let Some(path) = &self.scoring_config {
            require_file(path, ARG_SCORING_CONFIG)?;
        }
        Ok(())
    }

    fn engine_config(&self) -> Result<RecommenderConfig, CliError> {
        let mut config = RecommenderConfig::default();
        if let Some(path) = &self.scoring_config {
            config.scoring = load_scoring_config(path)?;
        }
        Ok(config)
    }
}

impl TryFrom<RecommendArgs> for RecommendConfig {
    type Error = CliError;

    fn try_from(args: RecommendArgs) -> Result<Self, Self::Error> {
        let venues = args.venues.ok_or(CliError::MissingArgument {
            field: ARG_VENUES,
            env: ENV_RECOMMEND_VENUES,
        })?;
        let user = args.user.ok_or(CliError::MissingArgument {
            field: ARG_USER,
            env: ENV_RECOMMEND_USER,
        })?;
        let taxonomy = TagTaxonomy::default();
        let tags: Vec<String> = args
            .tags
            .iter()
            .flat_map(|label| taxonomy.expand(label))
            .collect();

        let mut request = RecommendRequest::new(user).with_tags(tags);
        if let Some(location) = location(args.lat, args.lng)? {
            request = request.with_location(location);
        }
        if let Some(query) = args.query {
            request = request.with_query(query);
        }
        if let Some(rejected_place_id) = args.rejected_place {
            request = request.with_follow_up(FollowUp {
                rejected_place_id,
                negative_reason: args.avoid,
            });
        }

        Ok(Self {
            venues,
            reviews: args.reviews,
            gazetteer: args.gazetteer,
            ledger: args
                .ledger
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_LEDGER)),
            scoring_config: args.scoring_config,
            gemini_api_key: args.gemini_api_key.filter(|key| !key.trim().is_empty()),
            request,
        })
    }
}

fn location(lat: Option<f64>, lng: Option<f64>) -> Result<Option<Point<f64>>, CliError> {
    match (lat, lng) {
        (None, None) => Ok(None),
        (Some(lat), Some(lng))
            if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng) =>
        {
            Ok(Some(Point::new(lng, lat)))
        }
        _ => Err(CliError::InvalidLocation),
    }
}

pub(crate) fn require_file(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
    match path.metadata() {
        Ok(metadata) if metadata.is_file() => Ok(()),
        Ok(_) => Err(CliError::SourcePathNotFile {
            field,
            path: path.to_path_buf(),
        }),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            Err(CliError::MissingSourceFile {
                field,
                path: path.to_path_buf(),
            })
        }
        Err(source) => Err(CliError::InspectSourcePath {
            field,
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Loads a JSON-encoded [`ScoringConfig`] from disk.
pub(crate) fn load_scoring_config(path: &Utf8Path) -> Result<ScoringConfig, CliError> {
    let file = fs_utf8::File::open_ambient(path, ambient_authority()).map_err(|source| {
        CliError::ReadScoringConfig {
            path: path.to_path_buf(),
            source,
        }
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| {
        CliError::ParseScoringConfig {
            path: path.to_path_buf(),
            source,
        }
    })
}

fn build_recommender(config: &RecommendConfig) -> Result<Recommender, CliError> {
    let store = load_store(&config.venues, config.reviews.as_deref())?;
    let gazetteer = match &config.gazetteer {
        Some(path) => load_gazetteer(path)?,
        None => Gazetteer::new(Vec::new()),
    };
    let ledger = SqliteLedger::open(&config.ledger).map_err(|source| CliError::OpenLedger {
        path: config.ledger.clone(),
        source,
    })?;
    let taxonomy = TagTaxonomy::default();
    let vocabulary: Vec<String> = taxonomy
        .definitions()
        .iter()
        .map(|definition| definition.tag.clone())
        .collect();

    let recommender = Recommender::new(Arc::new(store), Arc::new(ledger), Arc::new(gazetteer))
        .with_config(config.engine_config()?)?;
    let Some(api_key) = &config.gemini_api_key else {
        info!("no Gemini API key; semantic search and intent classification are disabled");
        return Ok(recommender.with_taxonomy(taxonomy));
    };
    let gemini = GeminiConfig::new(api_key.clone());
    let embedder = ResilientEmbedder::new(GeminiEmbedder::new(gemini.clone())?);
    let classifier = GeminiIntentClassifier::new(gemini)?.with_tag_vocabulary(vocabulary);
    Ok(recommender
        .with_embedder(Arc::new(embedder))
        .with_classifier(Arc::new(classifier))
        .with_taxonomy(taxonomy))
}

/// Answer the request in `config`.
pub(crate) fn respond_with(config: &RecommendConfig) -> Result<Response, CliError> {
    let recommender = build_recommender(config)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    Ok(runtime.block_on(recommender.respond(&config.request)))
}

fn execute_recommend(args: RecommendArgs) -> Result<Response, CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    respond_with(&config)
}

pub(crate) fn run_recommend(args: RecommendArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let response = execute_recommend(args)?;
    write_json(writer, &response)
}
