use anyhow::Result;
use dave_core::config::DaveConfig;
use dave_interaction::Predictor;

/// One model poll; prints both transitions.
pub async fn update_models(config: &DaveConfig) -> Result<()> {
    let predictor = Predictor::from_config(&config.backends);
    let outcome = predictor.update_models().await;
    predictor.close().await;

    let (legacy, modern) = outcome?;
    let report = serde_json::json!({ "legacy": legacy, "modern": modern });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
