use anyhow::{Context, Result, bail};
use scenewatch_sync::SceneView;

use crate::app::App;
use crate::output;

fn print_scenes(view: &SceneView) {
    for scene in &view.scenes {
        let selected = view.selected.as_deref() == Some(scene.scene_id.as_str());
        println!("{}", output::scene_row(scene, selected));
    }
}

pub async fn run_scenes(app: &App, job_id: &str) -> Result<()> {
    let ws = app.workspace();
    let scenes = ws.scenes();
    let result = scenes.load_for_job(job_id).await;
    scenes.unmount();
    result.with_context(|| format!("Failed to load scenes for job {job_id}"))?;

    let view = scenes.view();
    if view.scenes.is_empty() {
        println!("No scenes for job {job_id}. Run `scenewatch build-scenes {job_id}` first.");
        return Ok(());
    }
    print_scenes(&view);
    Ok(())
}

pub async fn run_build_scenes(app: &App, job_id: &str) -> Result<()> {
    let ws = app.workspace();
    let scenes = ws.scenes();
    scenes.reset_for_job(Some(job_id));
    let result = scenes.build_scenes(job_id).await;
    scenes.unmount();

    let outcome = result.with_context(|| format!("Failed to build scenes for job {job_id}"))?;
    let Some(response) = outcome.applied() else {
        bail!("scene build for job {job_id} was superseded");
    };

    println!(
        "Built {} scene(s) for job {} ({})",
        response.scenes_created, response.job_id, response.status
    );
    print_scenes(&scenes.view());
    Ok(())
}

pub async fn run_scene(
    app: &App,
    job_id: &str,
    scene_id: &str,
    keyframes: Option<usize>,
) -> Result<()> {
    let mut options = app.sync_options();
    if let Some(count) = keyframes.filter(|count| *count > 0) {
        options.keyframes = count;
    }

    let ws = app.workspace_with(options);
    let scenes = ws.scenes();
    scenes.reset_for_job(Some(job_id));
    let result = scenes.select_scene(scene_id).await;
    scenes.unmount();
    result.with_context(|| format!("Failed to load scene {scene_id} of job {job_id}"))?;

    let Some(detail) = scenes.view().detail else {
        bail!("scene {scene_id} is not available");
    };

    for line in output::scene_details(&detail) {
        println!("{line}");
    }
    if !detail.keyframes.is_empty() {
        println!();
        for frame in &detail.keyframes {
            println!(
                "  {}  {}",
                output::format_clock(frame.timestamp_sec),
                app.client.asset_url(&frame.url)
            );
        }
    }
    Ok(())
}

pub async fn run_describe(app: &App, job_id: &str, scene_id: &str) -> Result<()> {
    let ws = app.workspace();
    let scenes = ws.scenes();

    let loaded = scenes.load_for_job(job_id).await;
    if let Err(e) = loaded {
        scenes.unmount();
        return Err(e).with_context(|| format!("Failed to load scenes for job {job_id}"));
    }
    if scenes.view().scene(scene_id).is_none() {
        scenes.unmount();
        bail!("scene {scene_id} not found in job {job_id}");
    }

    let result = scenes.describe_scene(job_id, scene_id).await;
    scenes.unmount();
    let outcome = result.with_context(|| format!("Failed to describe scene {scene_id}"))?;
    let Some(text) = outcome.applied() else {
        bail!("description of scene {scene_id} was superseded");
    };

    println!("{scene_id}: {text}");
    Ok(())
}
