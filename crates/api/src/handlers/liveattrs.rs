//! Handlers for the `/liveAttributes/{corpusId}` resource.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::broadcast;

use corvus_core::CoreError;
use corvus_db::repositories::LiveAttrsRepo;
use corvus_db::source::{AtomSource, JsonlAtomSource};
use corvus_db::DbPool;
use corvus_jobs::info::JobRecord;
use corvus_jobs::{
    JobInfo, JobWorker, JobsError, LiveAttrsArgs, LiveAttrsResult, JOB_TYPE_LIVEATTRS,
};

use crate::error::{AppError, AppResult};
use crate::liveattrs::cache::EmptyQueryCache;
use crate::liveattrs::laconf::{LaconfError, LiveAttrsBuildConf, PatchArgs};
use crate::liveattrs::query::Payload;
use crate::liveattrs::service;
use crate::response::DataResponse;
use crate::state::AppState;
use crate::subcmixer::category_tree::build_tree;
use crate::subcmixer::expression::{CategoryExpression, Expression, ExpressionJoin, JoinOp};
use crate::subcmixer::solver::{CategorySize, MixSolver, ProportionalSolver};

/// Atom records inserted per batch (and per progress update).
const INGEST_BATCH: usize = 1000;

/// Load corpus metadata or fail with 404.
pub(crate) async fn find_corpus(
    pool: &DbPool,
    corpus_id: &str,
) -> AppResult<corvus_db::models::CorpusInfo> {
    corvus_db::repositories::CorpusRepo::load_info(pool, corpus_id)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFound {
                entity: "corpus",
                id: corpus_id.to_string(),
            })
        })
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

/// POST /liveAttributes/{corpusId}/query
///
/// Computes the filtered attribute listing; empty queries are answered
/// from (and stored into) the empty-query cache.
pub async fn query(
    State(state): State<AppState>,
    Path(corpus_id): Path<String>,
    Json(payload): Json<Payload>,
) -> AppResult<impl IntoResponse> {
    let corpus_info = find_corpus(&state.pool, &corpus_id).await?;
    if let Some(cached) = state.eq_cache.get(&corpus_id, &payload) {
        tracing::debug!(corpus_id, "Serving listing from the empty-query cache");
        return Ok(Json((*cached).clone()));
    }

    let conf = state.la_conf.get(&corpus_id)?;
    let ans = service::get_attr_values(&state.pool, &corpus_info, &conf, &payload).await?;
    state
        .eq_cache
        .set(&corpus_id, &payload, Arc::new(ans.clone()));
    Ok(Json(ans))
}

// ---------------------------------------------------------------------------
// Data build job
// ---------------------------------------------------------------------------

/// Request body of a data build.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildDataRequest {
    /// Build configuration, required only when the corpus has none yet.
    #[serde(default)]
    pub config: Option<PatchArgs>,
    /// Aligned corpora whose caches are invalidated with the primary.
    #[serde(default)]
    pub aligned: Vec<String>,
    /// Append to existing data instead of replacing it.
    #[serde(default)]
    pub append: bool,
    /// Re-run a detached build under its original job ID (subject to
    /// the restart cap); other request fields are taken from the
    /// detached descriptor.
    #[serde(default)]
    pub restart_job_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
enum BuildError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("cannot read atom records: {0}")]
    Io(#[from] std::io::Error),

    #[error("job stopped on user request")]
    Stopped,
}

fn build_progress(initial: &JobInfo, processed: u64, inserted: u64) -> JobInfo {
    let mut update = initial.clone();
    if let JobInfo::LiveAttrs(rec) = &mut update {
        rec.result = Some(LiveAttrsResult {
            processed_atoms: processed,
            inserted_entries: inserted,
        });
    }
    update
}

/// Build the worker function of a live-attribute build job.
///
/// The worker streams progress descriptors after every batch, observes
/// the stop channel cooperatively between batches and invalidates the
/// empty-query cache of the corpus and all aligned corpora on success.
#[allow(clippy::too_many_arguments)]
fn liveattrs_build_worker(
    pool: DbPool,
    conf: Arc<LiveAttrsBuildConf>,
    grouped_name: String,
    corpus_id: String,
    aligned: Vec<String>,
    append: bool,
    data_path: PathBuf,
    cache: Arc<EmptyQueryCache>,
    mut stop_rx: broadcast::Receiver<String>,
    initial: JobInfo,
) -> JobWorker {
    Box::new(move |tx| {
        Box::pin(async move {
            let job_id = initial.id().to_string();
            let attr_columns = conf.attr_columns();

            let outcome: Result<(u64, u64), BuildError> = async {
                LiveAttrsRepo::ensure_schema(&pool, &grouped_name, &attr_columns).await?;
                if !append {
                    let removed =
                        LiveAttrsRepo::delete_corpus_data(&pool, &grouped_name, &corpus_id)
                            .await?;
                    tracing::info!(corpus_id, removed, "Dropped previous live-attribute data");
                }

                let mut source = JsonlAtomSource::open(&data_path).await?;
                let mut processed: u64 = 0;
                let mut inserted: u64 = 0;
                let mut batch = Vec::with_capacity(INGEST_BATCH);
                loop {
                    while let Ok(stopped_id) = stop_rx.try_recv() {
                        if stopped_id == job_id {
                            return Err(BuildError::Stopped);
                        }
                    }
                    let record = source.next_record().await?;
                    let done = record.is_none();
                    if let Some(record) = record {
                        batch.push(record);
                    }
                    if batch.len() >= INGEST_BATCH || (done && !batch.is_empty()) {
                        inserted += LiveAttrsRepo::insert_atoms(
                            &pool,
                            &grouped_name,
                            &corpus_id,
                            &attr_columns,
                            &batch,
                        )
                        .await?;
                        processed += batch.len() as u64;
                        batch.clear();
                        let _ = tx.send(build_progress(&initial, processed, inserted)).await;
                    }
                    if done {
                        break;
                    }
                }
                Ok((processed, inserted))
            }
            .await;

            match outcome {
                Ok((processed, inserted)) => {
                    let _ = tx.send(build_progress(&initial, processed, inserted)).await;
                    // Any cached listing touching this corpus (or an
                    // aligned one) is stale now.
                    cache.del(&corpus_id);
                    for aligned_corpus in &aligned {
                        cache.del(aligned_corpus);
                    }
                }
                Err(e) => {
                    let _ = tx.send(initial.with_error(e.to_string())).await;
                }
            }
        })
    })
}

/// POST /liveAttributes/{corpusId}/data
///
/// Enqueues a live-attribute build job and returns its descriptor
/// immediately. A still-running build of the same corpus is returned
/// instead of enqueueing a second one.
pub async fn create_data(
    State(state): State<AppState>,
    Path(corpus_id): Path<String>,
    Json(request): Json<BuildDataRequest>,
) -> AppResult<impl IntoResponse> {
    let corpus_info = find_corpus(&state.pool, &corpus_id).await?;

    if let Some(restart_id) = &request.restart_job_id {
        return restart_detached_build(&state, &corpus_info, restart_id).await;
    }

    if let Some(existing) = state
        .jobs
        .last_unfinished_job_of_type(&corpus_id, JOB_TYPE_LIVEATTRS)
    {
        tracing::info!(
            job_id = existing.id(),
            corpus_id,
            "A build is already running, returning its descriptor"
        );
        return Ok(Json(existing.full_info()));
    }

    let conf = match state.la_conf.get(&corpus_id) {
        Ok(conf) => conf,
        Err(LaconfError::NoSuchConfig(_)) => {
            let Some(patch) = &request.config else {
                return Err(LaconfError::NoSuchConfig(corpus_id).into());
            };
            let created = LiveAttrsBuildConf::create(&corpus_info, patch)?;
            state.la_conf.save(&created)?;
            Arc::new(created)
        }
        Err(e) => return Err(e.into()),
    };

    let initial = JobInfo::LiveAttrs(JobRecord::new(
        corpus_id.clone(),
        LiveAttrsArgs {
            aligned: request.aligned.clone(),
            append: request.append,
        },
    ));
    let worker = liveattrs_build_worker(
        state.pool.clone(),
        conf,
        corpus_info.grouped_name().to_string(),
        corpus_id.clone(),
        request.aligned.clone(),
        request.append,
        state.config.data_dir.join(format!("{corpus_id}.jsonl")),
        Arc::clone(&state.eq_cache),
        state.stop_tx.subscribe(),
        initial.clone(),
    );
    state.jobs.enqueue_job(worker, initial.clone()).await;
    Ok(Json(initial.full_info()))
}

/// Re-enqueue a detached build under its original ID, bumping the
/// restart counter. Re-registration removes the job from the detached
/// registry once it is admitted.
async fn restart_detached_build(
    state: &AppState,
    corpus_info: &corvus_db::models::CorpusInfo,
    restart_id: &str,
) -> AppResult<Json<serde_json::Value>> {
    let detached = state
        .jobs
        .get_detached_job(restart_id)
        .ok_or_else(|| JobsError::NoSuchJob(restart_id.to_string()))?;
    state.jobs.allows_restart(&detached)?;
    let JobInfo::LiveAttrs(rec) = &detached else {
        return Err(AppError::Unprocessable(format!(
            "job {restart_id} is not a live-attribute build"
        )));
    };
    let conf = state.la_conf.get(&rec.corpus_id)?;

    let initial = detached.with_bumped_restarts();
    let worker = liveattrs_build_worker(
        state.pool.clone(),
        conf,
        corpus_info.grouped_name().to_string(),
        rec.corpus_id.clone(),
        rec.args.aligned.clone(),
        rec.args.append,
        state
            .config
            .data_dir
            .join(format!("{}.jsonl", rec.corpus_id)),
        Arc::clone(&state.eq_cache),
        state.stop_tx.subscribe(),
        initial.clone(),
    );
    state.jobs.enqueue_job(worker, initial.clone()).await;
    tracing::info!(
        job_id = initial.id(),
        num_restarts = initial.num_restarts(),
        "Restarting a detached build"
    );
    Ok(Json(initial.full_info()))
}

/// DELETE /liveAttributes/{corpusId}/data
///
/// Drops the corpus' live-attribute rows and invalidates its cache
/// entries.
pub async fn delete_data(
    State(state): State<AppState>,
    Path(corpus_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let corpus_info = find_corpus(&state.pool, &corpus_id).await?;
    let removed =
        LiveAttrsRepo::delete_corpus_data(&state.pool, corpus_info.grouped_name(), &corpus_id)
            .await?;
    state.eq_cache.del(&corpus_id);
    tracing::info!(corpus_id, removed, "Deleted live-attribute data");
    Ok(Json(DataResponse {
        data: json!({ "removed": removed }),
    }))
}

// ---------------------------------------------------------------------------
// Build configuration
// ---------------------------------------------------------------------------

/// GET /liveAttributes/{corpusId}/conf
pub async fn get_conf(
    State(state): State<AppState>,
    Path(corpus_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let conf = state.la_conf.get(&corpus_id)?;
    Ok(Json((*conf).clone()))
}

/// PUT /liveAttributes/{corpusId}/conf
///
/// Creates or replaces the corpus' build configuration.
pub async fn put_conf(
    State(state): State<AppState>,
    Path(corpus_id): Path<String>,
    Json(patch): Json<PatchArgs>,
) -> AppResult<impl IntoResponse> {
    let corpus_info = find_corpus(&state.pool, &corpus_id).await?;
    let conf = LiveAttrsBuildConf::create(&corpus_info, &patch)?;
    state.la_conf.save(&conf)?;
    Ok(Json(conf))
}

// ---------------------------------------------------------------------------
// Sub-corpus mixing
// ---------------------------------------------------------------------------

/// One category constraint of a mix request: atoms are combined with
/// AND; the ratio is relative to the other conditions.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MixCondition {
    pub expression: Vec<CategoryExpression>,
    pub ratio: f64,
}

/// Request body of POST /liveAttributes/{corpusId}/mixSubcorpus.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MixRequest {
    pub conditions: Vec<MixCondition>,
    pub total_size: i64,
}

/// Result of one category after solving.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MixCategoryResult {
    pub condition: usize,
    pub ratio: f64,
    pub available_size: i64,
    pub assigned_size: i64,
    pub error_ratio: f64,
}

/// POST /liveAttributes/{corpusId}/mixSubcorpus
pub async fn mix_subcorpus(
    State(state): State<AppState>,
    Path(corpus_id): Path<String>,
    Json(request): Json<MixRequest>,
) -> AppResult<impl IntoResponse> {
    let corpus_info = find_corpus(&state.pool, &corpus_id).await?;
    if request.conditions.is_empty() {
        return Err(AppError::BadRequest(
            "at least one category condition is required".to_string(),
        ));
    }
    if request.total_size <= 0 {
        return Err(AppError::BadRequest(
            "totalSize must be positive".to_string(),
        ));
    }

    let mut conditions = Vec::with_capacity(request.conditions.len());
    for condition in &request.conditions {
        if condition.expression.is_empty() {
            return Err(AppError::Unprocessable(
                "a category condition must contain at least one expression".to_string(),
            ));
        }
        let mut join = ExpressionJoin::new(JoinOp::And);
        for atom in &condition.expression {
            // Re-construct to validate the operator coming off the wire.
            let atom = CategoryExpression::new(&atom.attr, &atom.op, &atom.value)
                .map_err(|e| AppError::Unprocessable(e.to_string()))?;
            join.add(Expression::Atom(atom));
        }
        conditions.push((join, condition.ratio));
    }

    let tree = build_tree(conditions);
    let mut categories = Vec::with_capacity(tree.children.len());
    for node in &tree.children {
        let condition = node.metadata_condition.as_ref().expect("child has condition");
        let (where_sql, params) = condition.as_sql(2);
        let available = LiveAttrsRepo::category_size(
            &state.pool,
            corpus_info.grouped_name(),
            &corpus_id,
            &where_sql,
            &params,
        )
        .await?;
        categories.push(CategorySize {
            ratio: node.ratio,
            available,
        });
    }

    let solver = ProportionalSolver;
    let assigned = solver.solve(&categories, request.total_size);
    let results: Vec<MixCategoryResult> = categories
        .iter()
        .zip(&assigned)
        .enumerate()
        .map(|(i, (category, &size))| {
            let target = category.ratio * request.total_size as f64;
            MixCategoryResult {
                condition: i,
                ratio: category.ratio,
                available_size: category.available,
                assigned_size: size,
                error_ratio: if target > 0.0 {
                    (target - size as f64).abs() / target
                } else {
                    0.0
                },
            }
        })
        .collect();
    let total_assigned: i64 = assigned.iter().sum();

    Ok(Json(json!({
        "totalAssigned": total_assigned,
        "categories": results,
    })))
}
