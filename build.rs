use std::env;

fn main() {
    // 環境変数をコンパイル時に埋め込み
    // ENVIRONMENT環境変数に基づいて適切な.envファイルを読み込み
    let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

    let env_file = match environment.as_str() {
        "production" => ".env.production",
        _ => ".env",
    };

    println!("cargo:rerun-if-env-changed=ENVIRONMENT");
    println!("cargo:rerun-if-changed={env_file}");

    // 環境変数ファイルを読み込み
    if dotenv::from_filename(env_file).is_ok() {
        println!("cargo:warning={env_file}ファイルを読み込みました");

        // Firebase設定をコンパイル時定数として埋め込み
        for name in [
            "FIREBASE_DATABASE_URL",
            "FIREBASE_AUTH_TOKEN",
            "STORAGE_BACKEND",
            "APP_TIMEZONE",
        ] {
            if let Ok(value) = env::var(name) {
                println!("cargo:rustc-env={name}={value}");
            }
        }

        // 注意: ENVIRONMENTは埋め込まない
        // 実行時に.envファイルから環境変数を読み込むため
    } else {
        println!("cargo:warning={env_file}ファイルが見つかりません");
    }
}
