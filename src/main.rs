#[tokio::main]
async fn main() {
    if let Err(e) = budget_tracker_lib::run().await {
        log::error!("アプリケーションの実行に失敗しました: {e}");
        eprintln!("アプリケーションの実行に失敗しました: {e}");
        std::process::exit(1);
    }
}
