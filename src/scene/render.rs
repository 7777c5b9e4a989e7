//! The commit pipeline: scanout attempt, composite render, and the
//! debug-damage visualization modes (spec.md §4.F).

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use cgmath::{prelude::*, Matrix3, Vector2};

use crate::backend::renderer::{RenderFrame, Renderer};
use crate::config::DebugDamageMode;
use crate::scene::geometry::{node_coords, scale_box};
use crate::scene::node::{BufferNode, Node, NodeTag, RectNode, TreeNode};
use crate::scene::output::SceneOutput;
use crate::scene::{query, HighlightRegion, SceneInner};
use crate::utils::clock::{Clock, Monotonic};
use crate::utils::{Logical, Physical, Rectangle, Time, Transform};

/// How long a debug-highlight overlay takes to fade from red/50% alpha to
/// fully transparent.
const HIGHLIGHT_FADE: Duration = Duration::from_millis(250);

/// Renders and presents one frame for `output` (spec.md §4.F).
///
/// Returns whether content actually reached the display: `true` for a
/// successful scanout or composite commit, or for a frame where nothing was
/// damaged (there was simply nothing to present); `false` only when a
/// composite commit was attempted and rejected.
pub(crate) fn scene_output_commit<R: Renderer>(
    scene: &Rc<RefCell<SceneInner>>,
    output: &SceneOutput,
    renderer: &mut R,
) -> bool {
    drain_texture_destroys(scene, renderer);

    let debug_mode = scene.borrow().debug_mode;

    let scanned_out = debug_mode != DebugDamageMode::Highlight && attempt_scanout(scene, output);
    if scanned_out != output.was_scanout_last_frame() {
        // The composition path may have missed frames of updates while
        // scanout was active (or vice versa); repaint everything.
        output.mark_whole_damaged();
    }
    output.set_scanout_last_frame(scanned_out);
    if scanned_out {
        tracing::trace!(index = output.index(), "presented via direct scanout");
        return true;
    }

    if debug_mode == DebugDamageMode::Rerender {
        output.mark_whole_damaged();
    }
    if debug_mode == DebugDamageMode::Highlight {
        record_and_fade_highlight(scene, output);
    }

    let (needs_frame, damage) = output.with_damage_mut(|d| d.attach_render());
    if !needs_frame {
        output.rollback();
        return true;
    }

    match render_composite(scene, output, renderer, &damage, debug_mode) {
        Ok(()) => {
            let physical_size = output.transformed_resolution();
            let hint: Vec<_> = damage
                .iter()
                .map(|r| output.transform().invert().transform_rect_in(*r, &physical_size))
                .collect();
            let committed = output.commit_with_damage(&hint);
            if debug_mode == DebugDamageMode::Highlight && has_pending_highlight(scene, output) {
                output.schedule_frame();
            }
            committed
        }
        Err(err) => {
            tracing::error!(index = output.index(), error = %err, "composite render failed, rolling back");
            output.rollback();
            false
        }
    }
}

/// Releases every texture queued by buffer replacement or node teardown
/// since the last call, through `renderer`'s own [`Renderer::destroy_texture`]
/// (spec.md §5: "Textures cached on Buffer nodes are destroyed on buffer
/// replacement and on node destruction"). A handle that doesn't belong to
/// `R` (mixing renderer backends within one process) is simply dropped, same
/// as `destroy_texture`'s own default body.
fn drain_texture_destroys<R: Renderer>(scene: &Rc<RefCell<SceneInner>>, renderer: &mut R) {
    let pending = std::mem::take(&mut scene.borrow_mut().pending_destroyed_textures);
    for texture in pending {
        if let Ok(texture) = texture.downcast::<R::TextureId>() {
            renderer.destroy_texture(*texture);
        }
    }
}

/// Fires `frame_done(now)` on every `Buffer` node whose `primary_output` is
/// `output` (spec.md §4.F).
pub(crate) fn send_frame_done(scene: &Rc<RefCell<SceneInner>>, output: &SceneOutput, now: Time<Monotonic>) {
    let root = scene.borrow().root.clone();
    query::for_each_buffer(&root, |buffer, _, _| {
        if buffer.primary_output() == Some(output.index()) {
            buffer.send_frame_done(now);
        }
    });
}

/// Step 1: attempt to hand a single fullscreen buffer directly to the
/// display, bypassing composition entirely.
fn attempt_scanout(scene: &Rc<RefCell<SceneInner>>, output: &SceneOutput) -> bool {
    let root = scene.borrow().root.clone();
    let Some(candidate) = scanout_candidate(&root, output) else {
        return false;
    };
    if !candidate.source_box().is_empty() {
        return false;
    }
    if candidate.transform() != output.transform() {
        return false;
    }
    let Some(buffer) = candidate.buffer_ref() else {
        return false;
    };

    output.attach_buffer(buffer.as_ref());
    if !output.test() {
        output.rollback();
        return false;
    }
    candidate.emit_present();
    output.commit()
}

/// The sole `Buffer` node eligible for scanout this frame: exactly one
/// enabled node overlaps the viewport, and it is a buffer whose bounding box
/// equals the viewport exactly.
fn scanout_candidate(root: &TreeNode, output: &SceneOutput) -> Option<BufferNode> {
    let viewport = output.viewport();
    let mut overlapping = 0u32;
    let mut exact_match = None;
    walk_for_scanout(root.node(), viewport, &mut overlapping, &mut exact_match);
    (overlapping == 1).then_some(exact_match).flatten()
}

fn walk_for_scanout(node: &Node, viewport: Rectangle<i32, Logical>, overlapping: &mut u32, exact_match: &mut Option<BufferNode>) {
    if !node.enabled() {
        return;
    }
    match node.tag() {
        NodeTag::Tree => {
            if let Some(tree) = TreeNode::from_node(node.clone()) {
                for child in tree.children() {
                    walk_for_scanout(&child, viewport, overlapping, exact_match);
                }
            }
        }
        NodeTag::Rect => {
            if let Some(rect) = RectNode::from_node(node.clone()) {
                let (gx, gy, _) = node_coords(node);
                let (w, h) = rect.size();
                if Rectangle::from_loc_and_size((gx, gy), (w, h)).overlaps(viewport) {
                    *overlapping += 1;
                }
            }
        }
        NodeTag::Buffer => {
            if let Some(buffer) = BufferNode::from_node(node.clone()) {
                let (gx, gy, _) = node_coords(node);
                let (w, h) = buffer.size();
                let box_: Rectangle<i32, Logical> = Rectangle::from_loc_and_size((gx, gy), (w, h));
                if box_.overlaps(viewport) {
                    *overlapping += 1;
                    *exact_match = (box_ == viewport).then_some(buffer);
                }
            }
        }
    }
}

/// Step 4: snapshot the current damage into a new highlight region, then age
/// out and de-overlap the scene's accumulated regions for this output.
fn record_and_fade_highlight(scene: &Rc<RefCell<SceneInner>>, output: &SceneOutput) {
    let clock: Clock<Monotonic> = Clock::new();
    let now = clock.now();

    let current_damage = output.with_damage_mut(|d| d.current().to_vec());
    if !current_damage.is_empty() {
        scene.borrow_mut().highlight_regions.push_front(HighlightRegion {
            output_index: output.index(),
            region: current_damage,
            when: now,
        });
    }

    let mut accumulator: Vec<Rectangle<i32, Physical>> = Vec::new();
    let mut remaining_for_others = VecDeque::new();
    let drained: Vec<HighlightRegion> = std::mem::take(&mut scene.borrow_mut().highlight_regions).into();

    for mut entry in drained {
        if entry.output_index != output.index() {
            remaining_for_others.push_back(entry);
            continue;
        }
        let visible: Vec<Rectangle<i32, Physical>> =
            Rectangle::subtract_rects_many(entry.region.iter().copied(), accumulator.iter().copied());
        accumulator.extend(visible.iter().copied());
        let age = Time::elapsed(&entry.when, now);
        if age >= HIGHLIGHT_FADE || visible.is_empty() {
            continue;
        }
        entry.region = visible;
        remaining_for_others.push_back(entry);
    }

    scene.borrow_mut().highlight_regions = remaining_for_others;
    output.with_damage_mut(|d| d.add(&accumulator));
}

fn has_pending_highlight(scene: &Rc<RefCell<SceneInner>>, output: &SceneOutput) -> bool {
    scene
        .borrow()
        .highlight_regions
        .iter()
        .any(|r| r.output_index == output.index())
}

/// Steps 6-9: clear the damage, paint the tree back-to-front, overlay the
/// debug-highlight regions, and draw software cursors.
fn render_composite<R: Renderer>(
    scene: &Rc<RefCell<SceneInner>>,
    output: &SceneOutput,
    renderer: &mut R,
    damage: &[Rectangle<i32, Physical>],
    debug_mode: DebugDamageMode,
) -> Result<(), R::Error> {
    let root = scene.borrow().root.clone();

    // Textures must be imported before the frame is opened: `R::Frame<'_>`
    // borrows the renderer, so nothing here can call back into it once
    // rendering starts.
    query::output_for_each_buffer(&root, output, |buffer, _, _| {
        let _ = buffer.texture_for(|buf| renderer.texture_from_buffer(buf).ok());
    });

    let physical_size = output.transformed_resolution();
    let mut frame = renderer.begin(physical_size.w, physical_size.h)?;

    for rect in damage {
        frame.scissor(Some(*rect))?;
        frame.clear([0.0, 0.0, 0.0, 1.0])?;
    }
    frame.scissor(None)?;

    render_tree(root.node(), output, damage, &mut frame)?;

    frame.scissor(None)?;
    if debug_mode == DebugDamageMode::Highlight {
        render_highlight_overlay(scene, output, &mut frame)?;
    }

    frame.scissor(None)?;
    output.render_software_cursors(damage);

    frame.finish()
}

fn render_tree<F: RenderFrame>(node: &Node, output: &SceneOutput, damage: &[Rectangle<i32, Physical>], frame: &mut F) -> Result<(), F::Error> {
    if !node.enabled() {
        return Ok(());
    }
    match node.tag() {
        NodeTag::Tree => {
            if let Some(tree) = TreeNode::from_node(node.clone()) {
                for child in tree.children() {
                    render_tree(&child, output, damage, frame)?;
                }
            }
            Ok(())
        }
        NodeTag::Rect => match RectNode::from_node(node.clone()) {
            Some(rect) => render_rect(&rect, output, damage, frame),
            None => Ok(()),
        },
        NodeTag::Buffer => match BufferNode::from_node(node.clone()) {
            Some(buffer) => render_buffer(&buffer, output, damage, frame),
            None => Ok(()),
        },
    }
}

fn render_rect<F: RenderFrame>(rect: &RectNode, output: &SceneOutput, damage: &[Rectangle<i32, Physical>], frame: &mut F) -> Result<(), F::Error> {
    let (gx, gy, enabled) = node_coords(rect.node());
    if !enabled {
        return Ok(());
    }
    let (w, h) = rect.size();
    if w <= 0 || h <= 0 {
        return Ok(());
    }
    let (ox, oy) = output.position();
    let dst = scale_box(gx - ox, gy - oy, w, h, output.scale());

    for rect_damage in damage {
        let Some(clip) = dst.intersection(*rect_damage) else {
            continue;
        };
        if clip.is_empty() {
            continue;
        }
        frame.scissor(Some(clip))?;
        frame.render_rect(dst, rect.color(), output.transform_matrix())?;
    }
    Ok(())
}

fn render_buffer<F: RenderFrame>(buffer: &BufferNode, output: &SceneOutput, damage: &[Rectangle<i32, Physical>], frame: &mut F) -> Result<(), F::Error> {
    let (gx, gy, enabled) = node_coords(buffer.node());
    if !enabled {
        return Ok(());
    }
    let (w, h) = buffer.size();
    if w <= 0 || h <= 0 {
        return Ok(());
    }
    let Some(texture) = buffer.texture_for::<F::TextureId>(|_| None) else {
        return Ok(());
    };

    let (ox, oy) = output.position();
    let dst = scale_box(gx - ox, gy - oy, w, h, output.scale());
    let matrix = dst_matrix(dst, buffer.transform().invert());
    let src = buffer_src_box(buffer);

    for rect_damage in damage {
        let Some(clip) = dst.intersection(*rect_damage) else {
            continue;
        };
        if clip.is_empty() {
            continue;
        }
        frame.scissor(Some(clip))?;
        frame.render_textured_quad(&texture, src, matrix, 1.0)?;
    }

    buffer.emit_present();
    Ok(())
}

fn buffer_src_box(buffer: &BufferNode) -> Rectangle<f64, crate::utils::Buffer> {
    let src = buffer.source_box();
    if !src.is_empty() {
        return src;
    }
    match buffer.buffer_dimensions() {
        Some((w, h)) => Rectangle::from_loc_and_size((0.0, 0.0), (w as f64, h as f64)),
        None => Rectangle::from_loc_and_size((0.0, 0.0), (0.0, 0.0)),
    }
}

/// Projects a destination box, transformed by `transform`, into the 3x3
/// matrix a [`RenderFrame::render_textured_quad`] call expects.
fn dst_matrix(dst: Rectangle<i32, Physical>, transform: Transform) -> Matrix3<f32> {
    let translate = Matrix3::from_translation(Vector2::new(dst.loc.x as f32, dst.loc.y as f32));
    let scale = Matrix3::from_nonuniform_scale(dst.size.w as f32, dst.size.h as f32);
    translate * scale * transform.matrix()
}

/// Step 8: overlay each of this output's highlight regions with a red tint
/// that fades from 50% alpha (freshly damaged) to transparent (250ms old).
fn render_highlight_overlay<F: RenderFrame>(scene: &Rc<RefCell<SceneInner>>, output: &SceneOutput, frame: &mut F) -> Result<(), F::Error> {
    let clock: Clock<Monotonic> = Clock::new();
    let now = clock.now();
    let regions: Vec<HighlightRegion> = scene
        .borrow()
        .highlight_regions
        .iter()
        .filter(|r| r.output_index == output.index())
        .map(|r| HighlightRegion {
            output_index: r.output_index,
            region: r.region.clone(),
            when: r.when,
        })
        .collect();

    for entry in &regions {
        let age = Time::elapsed(&entry.when, now);
        let fraction = 1.0 - (age.as_secs_f32() / HIGHLIGHT_FADE.as_secs_f32()).min(1.0);
        let alpha = 0.5 * fraction.max(0.0);
        if alpha <= 0.0 {
            continue;
        }
        for rect in &entry.region {
            frame.scissor(Some(*rect))?;
            frame.render_rect(*rect, [1.0, 0.0, 0.0, alpha], Transform::Normal.matrix())?;
        }
    }
    Ok(())
}
