//! Subcommand bodies; each returns the process exit code

use crate::{InstallArgs, PublishArgs, ReleaseArgs, SignArgs, VerifyArgs};
use sget::oidc::Secret;
use sget::{
    Aborted, Error, Executor, GithubReleaseSource, LocalMaterials, ManifestPublisher,
    PublishTarget, ReleaseCoordinates, SignConfig, SignWorkflow, VerifyConfig, VerifyWorkflow,
};
use std::fmt::Display;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn report<S: Display>(aborted: &Aborted<S>) -> i32 {
    tracing::debug!(error = ?aborted.error, "workflow aborted");
    eprintln!("Error: {}", aborted);
    aborted.exit_code()
}

fn fail(error: Error) -> i32 {
    eprintln!("Error: {}", error);
    error.exit_code()
}

fn sign_config(args: &SignArgs) -> SignConfig {
    let mut config = if args.staging {
        SignConfig::staging()
    } else {
        SignConfig::production()
    };
    if let Some(url) = &args.fulcio_url {
        config.fulcio_url = url.clone();
    }
    if let Some(url) = &args.rekor_url {
        config.rekor_url = url.clone();
    }
    if let Some(issuer) = &args.oidc_issuer {
        config.oidc.issuer = issuer.clone();
    }
    if let Some(client_id) = &args.oidc_client_id {
        config.oidc.client_id = client_id.clone();
    }
    config.oidc.client_secret = args
        .oidc_client_secret
        .as_deref()
        .map(Secret::from)
        .filter(|s| !s.is_empty());
    config.store_root = args.store_root.clone();
    config
}

fn publish_target(args: PublishArgs) -> Option<PublishTarget> {
    let (owner, repo) = (args.owner?, args.repo?);
    let mut target = PublishTarget::new(owner, repo);
    target.base_branch = args.base_branch;
    target.commit_branch = args.commit_branch;
    target.commit_message = args.commit_message.unwrap_or_default();
    target.merge_repo_owner = args.merge_repo_owner;
    target.merge_repo = args.merge_repo;
    target.merge_branch = args.merge_branch;
    target.pr_title = args.pr_title;
    target.pr_text = args.pr_text;
    target.author_name = args.author_name;
    target.author_email = args.author_email;
    Some(target)
}

pub async fn sign(args: SignArgs, cancel: &CancellationToken) -> i32 {
    let config = sign_config(&args);
    let identity = sget::select_provider(args.identity_token.clone());
    let mut workflow = match SignWorkflow::connect(config, identity) {
        Ok(workflow) => workflow,
        Err(e) => return fail(e),
    };
    if let Some(target) = publish_target(args.publish) {
        workflow = workflow.with_publisher(Box::new(ManifestPublisher), target);
    }

    match workflow.sign(&args.artifact, cancel).await {
        Ok(outcome) => {
            println!("Signature:   {}", outcome.materials.signature.display());
            println!("Certificate: {}", outcome.materials.certificate.display());
            println!(
                "Log entry:   {} (index {})",
                outcome.log_entry.uuid, outcome.log_entry.log_index
            );
            0
        }
        Err(aborted) => report(&aborted),
    }
}

fn release_workflow(args: &ReleaseArgs) -> Result<(VerifyWorkflow, ReleaseCoordinates), Error> {
    let (Some(owner), Some(repo)) = (&args.owner, &args.repo) else {
        return Err(Error::Config(
            "--owner and --repo are required to fetch a release".to_string(),
        ));
    };
    let token = args.github_token.as_deref().map(Secret::from);
    let config = VerifyConfig {
        api_url: args.api_url.clone(),
        api_token: token.clone(),
        ..VerifyConfig::default()
    };
    let source = GithubReleaseSource::new(&config.api_url, token)?;
    Ok((
        VerifyWorkflow::new(config, Arc::new(source)),
        ReleaseCoordinates::new(owner, repo, &args.tag),
    ))
}

pub async fn verify(args: VerifyArgs, cancel: &CancellationToken) -> i32 {
    if let (Some(script), Some(certificate), Some(signature)) =
        (args.script, args.certificate, args.signature)
    {
        let materials = LocalMaterials {
            script,
            certificate,
            signature,
        };
        return match sget::verify_materials(&materials) {
            Ok(verified) => {
                println!("Verified OK: {} ({})", verified.script().display(), verified.digest());
                0
            }
            Err(aborted) => report(&aborted),
        };
    }

    let (workflow, release) = match release_workflow(&args.release) {
        Ok(parts) => parts,
        Err(e) => return fail(e),
    };
    match workflow.verify_release(&release, cancel).await {
        Ok(verified) => {
            println!(
                "Verified OK: {} ({})",
                release,
                verified.verified().digest()
            );
            if let Some(identity) = verified.verified().identity() {
                println!("Signed by:   {}", identity);
            }
            0
        }
        Err(aborted) => report(&aborted),
    }
}

pub async fn install(args: InstallArgs, cancel: &CancellationToken) -> i32 {
    let (workflow, release) = match release_workflow(&args.release) {
        Ok(parts) => parts,
        Err(e) => return fail(e),
    };
    let executor = Executor::new(args.interpreter);
    match workflow.install(&release, &executor, cancel).await {
        Ok(status) => {
            let code = sget::exit_code(status);
            if code != 0 {
                tracing::warn!(code, "script exited with failure");
            }
            code
        }
        Err(aborted) => report(&aborted),
    }
}
