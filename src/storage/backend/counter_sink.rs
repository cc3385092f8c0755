//! CounterSink implementation for SeaOrmStorage
//!
//! 一次刷盘只执行一条 UPDATE：
//! `UPDATE zones SET impressions = CASE ..., clicks = CASE ... WHERE id IN (...)`
//! 所有值都通过绑定参数传入。

use std::collections::BTreeSet;

use async_trait::async_trait;
use sea_orm::sea_query::{CaseStatement, Expr, Query};
use sea_orm::{ConnectionTrait, ExprTrait};
use tracing::debug;

use super::SeaOrmStorage;
use super::retry;
use crate::events::CounterSink;
use crate::storage::models::{CounterField, CounterUpdate};

use migration::entities::zone;

fn counter_column(field: CounterField) -> zone::Column {
    match field {
        CounterField::Impressions => zone::Column::Impressions,
        CounterField::Clicks => zone::Column::Clicks,
    }
}

/// 为某个计数列构建 CASE 表达式，没有该列更新时返回 None
fn build_case(updates: &[CounterUpdate], field: CounterField) -> Option<CaseStatement> {
    let column = counter_column(field);
    let mut case_stmt = CaseStatement::new();
    let mut any = false;

    for update in updates.iter().filter(|u| u.field == field && u.delta > 0) {
        case_stmt = case_stmt.case(
            Expr::col(zone::Column::Id).eq(Expr::val(update.zone_id)),
            Expr::col(column).add(Expr::val(update.delta as i64)),
        );
        any = true;
    }

    // 不匹配的保持原值
    any.then(|| case_stmt.finally(Expr::col(column)))
}

#[async_trait]
impl CounterSink for SeaOrmStorage {
    async fn flush_counters(&self, updates: Vec<CounterUpdate>) -> anyhow::Result<()> {
        if updates.is_empty() {
            return Ok(());
        }

        let zone_ids: BTreeSet<i64> = updates.iter().map(|u| u.zone_id).collect();

        let mut stmt = Query::update();
        stmt.table(zone::Entity);
        let mut has_values = false;
        for field in [CounterField::Impressions, CounterField::Clicks] {
            if let Some(case_stmt) = build_case(&updates, field) {
                stmt.value(counter_column(field), case_stmt);
                has_values = true;
            }
        }
        if !has_values {
            return Ok(());
        }
        stmt.and_where(Expr::col(zone::Column::Id).is_in(zone_ids.iter().copied()));

        let db = &self.db;
        let stmt_ref = &stmt;
        retry::with_retry("flush_counters", self.retry_config, || async {
            db.execute(stmt_ref).await
        })
        .await
        .map_err(|e| {
            anyhow::anyhow!(
                "Failed to batch update zone counters (still failed after retries): {}",
                e
            )
        })?;

        debug!(
            "Zone counters flushed to {} database ({} zones, {} updates)",
            self.backend_name.to_uppercase(),
            zone_ids.len(),
            updates.len()
        );
        Ok(())
    }
}
