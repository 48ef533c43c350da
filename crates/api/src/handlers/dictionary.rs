//! Handlers for the `/dictionary/{corpusId}` resource.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use corvus_core::tagset::{first_supported, SupportedTagset};
use corvus_core::CoreError;
use corvus_db::repositories::{similar_arf_words, DictionarySearch, NgramFreqGenerator, QSAttributes};
use corvus_jobs::info::JobRecord;
use corvus_jobs::{JobInfo, JobWorker, NgramArgs, NgramResult};

use crate::error::{AppError, AppResult};
use crate::handlers::liveattrs::find_corpus;
use crate::state::AppState;

/// Default search-range coefficient of the ARF band lookup.
const DEFAULT_SIM_FREQ_RANGE_COEFF: f64 = 0.2;

/// Default result cap of the ARF band lookup.
const DEFAULT_SIM_FREQ_MAX_NUM_ITEMS: i64 = 20;

// ---------------------------------------------------------------------------
// N-gram generation
// ---------------------------------------------------------------------------

/// Query parameters of POST /dictionary/{corpusId}/ngrams.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NgramQuery {
    #[serde(default)]
    pub ngram_size: Option<i32>,
    #[serde(default)]
    pub append: Option<String>,
    #[serde(default)]
    pub parent_job_id: Option<String>,
}

/// Optional request body of the n-gram endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NgramReqArgs {
    #[serde(default)]
    pub col_mapping: Option<QSAttributes>,
    #[serde(default)]
    pub pos_tagset: Option<String>,
}

fn ngram_progress(initial: &JobInfo, processed: u64, total: u64) -> JobInfo {
    let mut update = initial.clone();
    if let JobInfo::NgramGeneration(rec) = &mut update {
        rec.result = Some(NgramResult {
            processed_rows: processed,
            total_rows: total,
        });
    }
    update
}

/// POST /dictionary/{corpusId}/ngrams
///
/// Enqueues an n-gram dictionary generation job, optionally after a
/// parent job (typically the corpus' live-attribute build). The column
/// mapping is taken from the request or inferred from the corpus'
/// tagset.
pub async fn generate_ngrams(
    State(state): State<AppState>,
    Path(corpus_id): Path<String>,
    Query(params): Query<NgramQuery>,
    body: Result<Json<NgramReqArgs>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    // The body is optional; a request without one uses the defaults.
    let args = match body {
        Ok(Json(args)) => args,
        Err(JsonRejection::MissingJsonContentType(_)) => NgramReqArgs::default(),
        Err(rejection) => return Err(AppError::BadRequest(rejection.to_string())),
    };
    let ngram_size = params.ngram_size.unwrap_or(1);
    if ngram_size < 1 {
        return Err(AppError::BadRequest("ngramSize must be >= 1".to_string()));
    }
    let append = params.append.as_deref() == Some("1");

    if let Some(mapping) = &args.col_mapping {
        mapping
            .validate()
            .map_err(|e| AppError::Unprocessable(e.to_string()))?;
    }

    let tagset = match &args.pos_tagset {
        Some(id) => {
            SupportedTagset::from_id(id).map_err(|e| AppError::Unprocessable(e.to_string()))?
        }
        None => {
            let candidates = corvus_db::repositories::CorpusRepo::tagsets(
                &state.pool,
                &corpus_id,
            )
            .await?;
            first_supported(&candidates).ok_or_else(|| {
                AppError::Unprocessable(format!(
                    "cannot find a suitable default tagset for {corpus_id} (found: {})",
                    candidates.join(", "),
                ))
            })?
        }
    };
    let col_mapping = args
        .col_mapping
        .unwrap_or_else(|| QSAttributes::default_for(tagset));
    // Re-validate: the inference must have produced a correct setup too.
    col_mapping
        .validate()
        .map_err(|e| AppError::Unprocessable(e.to_string()))?;

    // The corpus must have been installed (built) before.
    state.la_conf.get(&corpus_id)?;
    let corpus_info = find_corpus(&state.pool, &corpus_id).await?;

    let generator = NgramFreqGenerator {
        grouped_name: corpus_info.grouped_name().to_string(),
        corpus_name: corpus_info.name.clone(),
        append,
        ngram_size,
        tagset,
        attrs: col_mapping,
    };

    let initial = JobInfo::NgramGeneration(JobRecord::new(
        corpus_id.clone(),
        NgramArgs { ngram_size, append },
    ));
    let pool = state.pool.clone();
    let initial_for_worker = initial.clone();
    let worker: JobWorker = Box::new(move |tx| {
        Box::pin(async move {
            let outcome = generator
                .generate(&pool, |processed, total| {
                    // Progress updates are best-effort; the final state
                    // is reported below either way.
                    let _ = tx.try_send(ngram_progress(&initial_for_worker, processed, total));
                })
                .await;
            match outcome {
                Ok((processed, total)) => {
                    let _ = tx
                        .send(ngram_progress(&initial_for_worker, processed, total))
                        .await;
                }
                Err(e) => {
                    let _ = tx.send(initial_for_worker.with_error(e.to_string())).await;
                }
            }
        })
    });

    match &params.parent_job_id {
        Some(parent_id) if !parent_id.is_empty() => {
            state
                .jobs
                .enqueue_job_after(worker, initial.clone(), parent_id)
                .await?;
        }
        _ => state.jobs.enqueue_job(worker, initial.clone()).await,
    }
    Ok(Json(initial.full_info()))
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Query parameters of the dictionary search endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    #[serde(default)]
    pub pos: Option<String>,
    #[serde(default)]
    pub sublemma: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
}

/// GET /dictionary/{corpusId}/search/{term}
///
/// Term search over the generated dictionary; the term matches word
/// form, lemma or sublemma.
pub async fn search(
    State(state): State<AppState>,
    Path((corpus_id, term)): Path<(String, String)>,
    Query(params): Query<SearchQuery>,
) -> AppResult<impl IntoResponse> {
    let corpus_info = find_corpus(&state.pool, &corpus_id).await?;
    let mut search = DictionarySearch::new(corpus_info.grouped_name()).with_any_value(term);
    if let Some(pos) = &params.pos {
        search = search.with_pos(pos.clone());
    }
    if let Some(sublemma) = &params.sublemma {
        search = search.with_sublemma(sublemma.clone());
    }
    if let Some(limit) = params.limit {
        search = search.with_limit(limit);
    }
    let matches = search.run(&state.pool).await?;
    Ok(Json(json!({ "matches": matches })))
}

// ---------------------------------------------------------------------------
// Similar ARF words
// ---------------------------------------------------------------------------

/// Query parameters of the ARF band lookup.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarArfQuery {
    #[serde(default)]
    pub pos: Option<String>,
    #[serde(default)]
    pub lemma: Option<String>,
    #[serde(default)]
    pub range_coeff: Option<f64>,
    #[serde(default)]
    pub max_items: Option<i64>,
}

/// GET /dictionary/{corpusId}/similarARFWords/{term}
///
/// Words with an average reduced frequency close to the given term's.
pub async fn similar_arf(
    State(state): State<AppState>,
    Path((corpus_id, term)): Path<(String, String)>,
    Query(params): Query<SimilarArfQuery>,
) -> AppResult<impl IntoResponse> {
    let range_coeff = params.range_coeff.unwrap_or(DEFAULT_SIM_FREQ_RANGE_COEFF);
    if range_coeff <= 0.0 || range_coeff >= 1.0 {
        return Err(AppError::BadRequest(
            "rangeCoeff must be from interval (0, 1)".to_string(),
        ));
    }
    let max_items = params.max_items.unwrap_or(DEFAULT_SIM_FREQ_MAX_NUM_ITEMS);

    let corpus_info = find_corpus(&state.pool, &corpus_id).await?;
    if corpus_info.size <= 0 {
        return Err(AppError::BadRequest(format!(
            "cannot calculate the word list, reported corpus size for {corpus_id} is zero",
        )));
    }

    let mut term_search = DictionarySearch::new(corpus_info.grouped_name())
        .with_word(term.clone())
        .with_limit(1);
    if let Some(lemma) = &params.lemma {
        term_search = term_search.with_lemma(lemma.clone());
    }
    if let Some(pos) = &params.pos {
        term_search = term_search.with_pos(pos.clone());
    }
    let found = term_search.run(&state.pool).await?;
    let Some(entry) = found.first() else {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "dictionary entry",
            id: term,
        }));
    };

    let mut matches = similar_arf_words(
        &state.pool,
        corpus_info.grouped_name(),
        entry.arf,
        range_coeff,
        max_items,
    )
    .await?;
    for item in &mut matches {
        item.ipm = item.count as f64 / corpus_info.size as f64 * 1_000_000.0;
    }
    Ok(Json(json!({ "matches": matches })))
}
