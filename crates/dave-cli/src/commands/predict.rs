use anyhow::Result;
use dave_core::config::DaveConfig;
use dave_core::generation::Context;
use dave_interaction::Predictor;

/// One prediction; prints the provenance dump.
pub async fn predict(config: &DaveConfig, utterances: Vec<String>, legacy: bool) -> Result<()> {
    let context = if utterances.len() == 1 {
        Context::from(utterances.concat())
    } else {
        Context::from(utterances)
    };

    let predictor = Predictor::from_config(&config.backends);
    let outcome = predictor.predict(context, legacy).await;
    predictor.close().await;

    println!("{}", outcome?.dump()?);
    Ok(())
}
