// ==========================================
// OBARI 生命周期引擎 - 命令行入口
// ==========================================
// 用法:
//   obari week-slot <YYYY-MM-DD>
//   obari create <counterparty_ref> <INBOUND|OUTBOUND> [actor]
//   obari submit <deal_id> <TARGET_STATUS> <facts_json> [actor] [--draft <draft_json>]
//   obari cancel <deal_id> <reason> [actor]
//   obari deal <deal_id>
//   obari history <deal_id>
//   obari consume <item_id> <qty> [reference]
//   obari receive <item_id> <qty> [reference]
//   obari intents <item_id>
//
// 数据库路径: OBARI_DB_PATH 或用户数据目录
// ==========================================

use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;

use obari_lifecycle::app::{get_default_db_path, AppState};
use obari_lifecycle::domain::staging::OrderDraft;
use obari_lifecycle::logging;

const CLI_ACTOR: &str = "cli";

fn main() -> Result<()> {
    logging::init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let draft = take_draft(&mut args)?;
    let Some(command) = args.first().map(|s| s.as_str()) else {
        print_usage();
        return Ok(());
    };
    let arg = |i: usize, name: &str| -> Result<&str> {
        args.get(i)
            .map(|s| s.as_str())
            .ok_or_else(|| anyhow!("缺少参数: {}", name))
    };
    let actor = |i: usize| args.get(i).map(|s| s.as_str()).unwrap_or(CLI_ACTOR);

    let db_path = get_default_db_path();
    tracing::info!("{} v{} 使用数据库: {}", obari_lifecycle::APP_NAME, obari_lifecycle::VERSION, db_path);
    let state = AppState::new(db_path).map_err(|e| anyhow!(e))?;

    match command {
        "week-slot" => print_json(&state.stock_api.cadence_window(arg(1, "date")?)?),
        "create" => print_json(&state.deal_api.create_deal(
            arg(1, "counterparty_ref")?,
            arg(2, "direction")?,
            actor(3),
        )?),
        "submit" => {
            let facts: serde_json::Value =
                serde_json::from_str(arg(3, "facts_json")?).context("事实包不是合法 JSON")?;
            print_json(&state.deal_api.submit(
                arg(1, "deal_id")?,
                arg(2, "target")?,
                &facts,
                draft.as_ref(),
                actor(4),
            )?)
        }
        "cancel" => print_json(&state.deal_api.cancel(
            arg(1, "deal_id")?,
            arg(2, "reason")?,
            actor(3),
        )?),
        "deal" => print_json(&state.deal_api.get_deal(arg(1, "deal_id")?)?),
        "history" => print_json(&state.deal_api.history(arg(1, "deal_id")?)?),
        "consume" | "receive" => {
            let qty: f64 = arg(2, "qty")?
                .parse()
                .with_context(|| format!("数量格式错误: {}", args[2]))?;
            let direction = if command == "consume" { "OUT" } else { "IN" };
            print_json(&state.stock_api.record_movement(
                arg(1, "item_id")?,
                qty,
                direction,
                args.get(3).map(|s| s.as_str()),
            )?)
        }
        "intents" => print_json(&state.stock_api.planning_intents(arg(1, "item_id")?)?),
        other => {
            print_usage();
            bail!("未知命令: {}", other)
        }
    }
}

/// 取出 `--draft <json>` 选项 (订单确认时使用), 其余参数保持位置不变
fn take_draft(args: &mut Vec<String>) -> Result<Option<OrderDraft>> {
    let Some(pos) = args.iter().position(|a| a == "--draft") else {
        return Ok(None);
    };
    if pos + 1 >= args.len() {
        bail!("缺少参数: --draft 后需要订单草稿 JSON");
    }
    let raw = args.remove(pos + 1);
    args.remove(pos);
    let draft = serde_json::from_str(&raw).context("订单草稿不是合法 JSON")?;
    Ok(Some(draft))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_usage() {
    eprintln!(
        "用法: obari <week-slot|create|submit|cancel|deal|history|consume|receive|intents> [参数...]"
    );
}
