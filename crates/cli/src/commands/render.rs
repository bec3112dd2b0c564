//! `bellwether render`: preview notifications for a sample execution.

use anyhow::{Context, Result};
use notifications::{
    DomainName, ExecutionId, ExecutionMetadata, ExecutionName, ExecutionPhase, LaunchPlanName,
    LaunchPlanRef, ProjectName, RenderSettings, WorkflowName, WorkflowRef,
};
use serde::Serialize;

use crate::{settings, ConfigArgs};

#[derive(Debug, clap::Args)]
pub struct RenderArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Terminal phase, e.g. `failed` or `TIMED_OUT`.
    #[arg(long)]
    pub phase: ExecutionPhase,

    #[arg(long)]
    pub workflow: String,

    #[arg(long, default_value = "flytesnacks")]
    pub project: String,

    #[arg(long, default_value = "development")]
    pub domain: String,

    /// Execution name.
    #[arg(long, default_value = "preview")]
    pub name: String,

    /// Launch plan name; defaults to the workflow name.
    #[arg(long)]
    pub launch_plan: Option<String>,

    /// Error message reported by the engine.
    #[arg(long)]
    pub error: Option<String>,
}

/// Every configured template rendered for one execution.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct Preview {
    pub email_subject: String,
    pub email_body: String,
    pub slack_message: String,
    pub pager_duty_summary: String,
}

pub fn execute(args: &RenderArgs) -> Result<()> {
    let config = settings::load(args.config.config.as_deref())?;
    let settings = config.render_settings()?;
    let preview = preview(&settings, &metadata(args)?);
    println!("{}", serde_json::to_string_pretty(&preview)?);
    Ok(())
}

pub fn preview(settings: &RenderSettings, execution: &ExecutionMetadata) -> Preview {
    Preview {
        email_subject: settings.email_subject.render(execution),
        email_body: settings.email_body.render(execution),
        slack_message: settings.slack_message.render(execution),
        pager_duty_summary: settings.pager_duty_summary.render(execution),
    }
}

fn metadata(args: &RenderArgs) -> Result<ExecutionMetadata> {
    let launch_plan = args.launch_plan.as_deref().unwrap_or(&args.workflow);
    Ok(ExecutionMetadata {
        id: ExecutionId::new(
            ProjectName::new(args.project.as_str()).context("--project must not be empty")?,
            DomainName::new(args.domain.as_str()).context("--domain must not be empty")?,
            ExecutionName::new(args.name.as_str()).context("--name must not be empty")?,
        ),
        phase: args.phase,
        workflow: WorkflowRef {
            name: WorkflowName::new(args.workflow.as_str())
                .context("--workflow must not be empty")?,
            version: None,
        },
        launch_plan: LaunchPlanRef {
            name: LaunchPlanName::new(launch_plan).context("--launch-plan must not be empty")?,
            version: None,
        },
        error: args.error.clone(),
    })
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use notifications::NotificationsConfig;

    use super::*;
    use crate::{Cli, Commands};

    fn parse(args: &[&str]) -> RenderArgs {
        let mut argv = vec!["bellwether", "render"];
        argv.extend_from_slice(args);
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Commands::Render(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn default_templates_render_for_a_failure() {
        let args = parse(&[
            "--phase",
            "failed",
            "--workflow",
            "int_doubler_wf",
            "--name",
            "f3a9",
            "--error",
            "OOMKilled",
        ]);
        let settings = NotificationsConfig::default().render_settings().unwrap();

        let preview = preview(&settings, &metadata(&args).unwrap());

        assert_eq!(
            preview.email_subject,
            "Notice: Execution \"int_doubler_wf\" has failed in \"development\"."
        );
        assert_eq!(
            preview.email_body,
            "Execution \"int_doubler_wf [f3a9]\" has failed in \"development\". The execution failed with error: [OOMKilled]."
        );
    }

    #[test]
    fn launch_plan_defaults_to_workflow() {
        let args = parse(&["--phase", "TIMED_OUT", "--workflow", "nightly"]);
        let meta = metadata(&args).unwrap();
        assert_eq!(meta.launch_plan.name.as_str(), "nightly");
        assert_eq!(meta.phase, ExecutionPhase::TimedOut);
    }

    #[test]
    fn unknown_phase_is_rejected_by_the_parser() {
        let result = Cli::try_parse_from([
            "bellwether",
            "render",
            "--phase",
            "RUNNING",
            "--workflow",
            "w",
        ]);
        assert!(result.is_err());
    }
}
