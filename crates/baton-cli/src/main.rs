use std::sync::Arc;

use anyhow::{Context, anyhow};
use tokio::sync::oneshot;
use tokio::time::{Duration, sleep};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use baton_core::{
    BatonConfig, CompletionState, Defect, DefectPolicy, Executor, Task, TaskController, TokioQueue,
    reporting,
};

/// async 側から Task の完了を待つための橋渡し（継続から oneshot に流す）
async fn settle<T: Send + 'static>(
    task: &Task<T>,
    executor: Executor,
) -> anyhow::Result<CompletionState<T>> {
    let (tx, rx) = oneshot::channel();
    let _watch = task.on_complete_in(executor, move |c| {
        let _ = tx.send(c);
        CompletionState::Done(())
    });
    rx.await
        .with_context(|| format!("continuation of {} was dropped without running", task.id()))
}

fn describe<T: std::fmt::Debug>(c: &CompletionState<T>) -> String {
    match c {
        CompletionState::Done(v) => format!("done({v:?})"),
        CompletionState::Error(e) => format!("error({e})"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // (A) defect 報告の初期化（デモなので assert ではなくログ + JSON 出力）
    let config = BatonConfig::from_env().with_defect_policy(DefectPolicy::Log);
    baton_core::init(&config);
    reporting::set_handler(|d: &Defect| println!("defect: {}", d.to_json()));

    let queue = Executor::queue(Arc::new(
        TokioQueue::try_current("baton-demo").ok_or_else(|| anyhow!("no tokio runtime"))?,
    ));

    // (B) 継続の連鎖: on_done ×2 で失敗させ、on_error で回復する
    let chained = Task::done(1222)
        .on_done(|x| Ok::<_, anyhow::Error>(x * 2))
        .on_done(|x| {
            if x > 2000 {
                Err(anyhow!("{x} is too large"))
            } else {
                Ok(x)
            }
        })
        .on_error(|e| {
            warn!(error = %e, "recovering with 0");
            Ok::<_, anyhow::Error>(0)
        });
    println!("chain: {}", describe(&settle(&chained, Executor::Immediate).await?));

    // (C) controller を別の tokio タスクから完了させ、継続は TokioQueue 上で走らせる
    let controller = TaskController::<String>::new();
    let greeting = controller.task();
    let producer = tokio::spawn(async move {
        sleep(Duration::from_millis(50)).await;
        controller.done("hello from a producer".to_string())
    });
    let shouted = greeting.on_complete_in(queue.clone(), |c| c.map(|s| s.to_uppercase()));
    producer.await??;
    println!("controller: {}", describe(&settle(&shouted, queue.clone()).await?));

    // (D) fan-in: 完了済み 3 件 + 後から完了する 1 件（到着順で並ぶ）
    let late = TaskController::<i32>::new();
    let inputs = [Task::done(111), late.task(), Task::done(222), Task::done(333)];
    let all = Task::wait_for_all_of(&inputs);
    tokio::spawn(async move {
        sleep(Duration::from_millis(20)).await;
        late.fail(anyhow!("444 never came"))
    })
    .await??;
    match settle(&all, queue.clone()).await? {
        CompletionState::Done(entries) => {
            let shown: Vec<_> = entries.iter().map(describe).collect();
            println!("fan-in: [{}]", shown.join(", "));
        }
        CompletionState::Error(e) => return Err(anyhow!(e)),
    }

    // (E) わざと defect を起こす: 誰も見ない Error を持ったまま drop
    drop(Task::<i32>::failed(anyhow!("nobody is listening")));

    // 報告は専用スレッドで処理されるので、終了前に吐き出しておく
    tokio::task::spawn_blocking(reporting::flush).await?;
    info!("demo finished");
    Ok(())
}
