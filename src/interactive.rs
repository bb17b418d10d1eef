use crate::config::DeploymentStep;

pub fn confirm_step(step: &DeploymentStep) -> eyre::Result<bool> {
    let proceed = inquire::Confirm::new(&format!("Continue with {step}?"))
        .with_default(true)
        .prompt()?;

    Ok(proceed)
}

pub fn confirm_without_verification() -> eyre::Result<bool> {
    let proceed = inquire::Confirm::new(
        "No explorer API keys found, continue without verification?",
    )
    .with_default(false)
    .prompt()?;

    Ok(proceed)
}
