//! End-to-end frame tests against the headless device
//!
//! Each test builds a small scene through `RenderCore`, runs a few ticks and
//! inspects what reached the device.

use approx::assert_relative_eq;
use render_core::foundation::logging;
use render_core::prelude::*;
use render_core::render::api::ResourceHandle;
use render_core::render::backends::DrawRecord;
use render_core::render::systems::BatchKey;

fn core_with(config: RenderConfig) -> RenderCore {
    logging::init_for_tests();
    let mut core = RenderCore::new(Box::new(HeadlessDevice::new()), config).unwrap();
    core.upload_mesh("cube", &MeshData::cube()).unwrap();
    core.create_material("flat", &ShaderDescriptor::new("flat")).unwrap();
    core.create_camera("main", Vec3::new(0.0, 0.0, 10.0), Vec3::zeros(), 60.0, 16.0 / 9.0, 0.1, 100.0);
    core
}

fn core() -> RenderCore {
    core_with(RenderConfig::default())
}

fn headless(core: &mut RenderCore) -> &mut HeadlessDevice {
    core.device_as_mut::<HeadlessDevice>().unwrap()
}

fn batch_draws(core: &mut RenderCore) -> Vec<DrawRecord> {
    headless(core)
        .take_draws()
        .into_iter()
        .filter(|draw| draw.list.starts_with("batch:"))
        .collect()
}

fn spawn_at(core: &mut RenderCore, name: &str, material: &str, position: Vec3) -> Entity {
    let entity = core.spawn(name, "cube", material, false);
    core.set_transform(entity, &Transform::from_position(position));
    entity
}

fn is_visible(core: &RenderCore, entity: Entity) -> bool {
    core.world().get::<RenderFlags>(entity).is_some_and(|flags| flags.visible)
}

#[test]
fn test_visibility_follows_the_camera_frustum() {
    let mut core = core();
    let cube = spawn_at(&mut core, "cube", "flat", Vec3::zeros());
    assert!(!is_visible(&core, cube));

    let stats = core.tick(1.0 / 60.0).unwrap();
    assert!(is_visible(&core, cube));
    assert_eq!(stats.cull.shown, 1);
    assert_eq!(stats.draw.batches, 1);

    core.set_transform(cube, &Transform::from_position(Vec3::new(0.0, 0.0, 50.0)));
    let stats = core.tick(1.0 / 60.0).unwrap();
    assert!(!is_visible(&core, cube));
    assert_eq!(stats.cull.hidden, 1);
    assert_eq!(stats.draw.batches, 0);
}

#[test]
fn test_skybox_is_drawn_from_anywhere() {
    let mut core = core();
    let skybox = spawn_at(&mut core, "skybox", "flat", Vec3::new(0.0, 0.0, 500.0));

    core.tick(1.0 / 60.0).unwrap();
    assert!(is_visible(&core, skybox));
}

#[test]
fn test_instanced_material_draws_once_per_batch() {
    let mut core = core();
    core.create_material("crowd", &ShaderDescriptor::new("crowd").with_instancing(true))
        .unwrap();
    for x in [-2.0, 0.0, 2.0] {
        spawn_at(&mut core, "member", "crowd", Vec3::new(x, 0.0, 0.0));
    }
    for x in [-1.0, 1.0] {
        spawn_at(&mut core, "prop", "flat", Vec3::new(x, 1.0, 0.0));
    }

    let stats = core.tick(1.0 / 60.0).unwrap();
    assert_eq!(stats.draw.batches, 2);
    assert_eq!(stats.draw.draws, 3);
    assert_eq!(stats.draw.instances, 5);

    let draws = batch_draws(&mut core);
    let instanced: Vec<_> = draws.iter().filter(|d| d.list == "batch:cube:crowd").collect();
    assert_eq!(instanced.len(), 1);
    assert_eq!(instanced[0].instance_count, 3);
    assert!(instanced[0].vertex_buffers.contains_key(&1));

    let individual: Vec<_> = draws.iter().filter(|d| d.list == "batch:cube:flat").collect();
    assert_eq!(individual.len(), 2);
    assert!(individual.iter().all(|d| d.instance_count == 1));
}

#[test]
fn test_each_draw_sees_its_own_transform() {
    let mut core = core();
    spawn_at(&mut core, "left", "flat", Vec3::new(-2.0, 0.0, 0.0));
    spawn_at(&mut core, "right", "flat", Vec3::new(2.0, 0.0, 0.0));
    let transform = core.materials().shared().transform;

    core.tick(1.0 / 60.0).unwrap();
    let draws = batch_draws(&mut core);
    assert_eq!(draws.len(), 2);

    // Column-major world matrix: translation sits at floats 12..15
    let mut xs: Vec<f32> = draws.iter().map(|d| d.uniform(transform).unwrap()[12]).collect();
    xs.sort_by(f32::total_cmp);
    assert_relative_eq!(xs[0], -2.0);
    assert_relative_eq!(xs[1], 2.0);
}

#[test]
fn test_material_creation_is_idempotent() {
    let mut core = core();
    let pipelines = headless(&mut core).live_pipeline_count();

    let first = core.create_material("flat", &ShaderDescriptor::new("flat")).unwrap();
    let second = core.create_material("flat", &ShaderDescriptor::new("other")).unwrap();
    assert_eq!(first, second);
    assert_eq!(headless(&mut core).live_pipeline_count(), pipelines);
}

#[test]
fn test_material_properties_are_packed_before_the_draw() {
    let mut core = core();
    let descriptor = ShaderDescriptor::new("tinted")
        .with_property("roughness", PropertyShape::Scalar)
        .with_property("albedo", PropertyShape::Vec3);
    core.create_material("tinted", &descriptor).unwrap();
    core.set_material_property("tinted", "albedo", PropertyValue::Vec3([0.2, 0.4, 0.6]))
        .unwrap();
    assert!(core
        .set_material_property("tinted", "albedo", PropertyValue::Scalar(1.0))
        .is_err());
    spawn_at(&mut core, "tinted", "tinted", Vec3::zeros());
    let material = core.materials().shared().material;

    core.tick(1.0 / 60.0).unwrap();
    let draws = batch_draws(&mut core);
    let packed = draws[0].uniform(material).unwrap();
    assert_eq!(&packed[..5], &[1.0, 0.0, 0.2, 0.4, 0.6]);
}

#[test]
fn test_unresolved_batch_is_skipped() {
    let mut core = core();
    spawn_at(&mut core, "good", "flat", Vec3::zeros());
    spawn_at(&mut core, "bad", "missing", Vec3::new(1.0, 0.0, 0.0));

    for _ in 0..2 {
        let stats = core.tick(1.0 / 60.0).unwrap();
        assert_eq!(stats.draw.batches, 1);
        assert_eq!(stats.draw.skipped_batches, 1);
    }
    assert_eq!(headless(&mut core).present_count(), 2);
}

#[test]
fn test_mesh_registered_after_spawn_is_picked_up() {
    let mut core = core();
    let late = core.spawn("late", "sphere", "flat", false);

    let stats = core.tick(1.0 / 60.0).unwrap();
    assert_eq!(stats.cull.inert, 1);
    assert!(!is_visible(&core, late));

    core.upload_mesh("sphere", &MeshData::cube()).unwrap();
    core.tick(1.0 / 60.0).unwrap();
    assert!(is_visible(&core, late));
}

#[test]
fn test_shadow_matrix_is_stable_for_a_still_camera() {
    let mut core = core();
    core.create_light(
        LightFactory::directional(Vec3::new(1.0, 1.0, 1.0), 1.0),
        TransformComponent::identity().with_forward(Vec3::new(-0.3, -1.0, -0.2).normalize()),
    );
    let caster = core.spawn("caster", "cube", "flat", true);

    let stats = core.tick(1.0 / 60.0).unwrap();
    assert_eq!(stats.shadow_draws, 1);
    let first = *core.scheduler().shadow_fitter().light_view_projection();
    assert_ne!(first, Mat4::identity());

    core.tick(1.0 / 60.0).unwrap();
    let second = *core.scheduler().shadow_fitter().light_view_projection();
    assert_eq!(first.as_slice(), second.as_slice());

    // Moving a caster does not move the fit
    core.set_transform(caster, &Transform::from_position(Vec3::new(3.0, 0.0, 0.0)));
    core.tick(1.0 / 60.0).unwrap();
    assert_eq!(core.scheduler().shadow_fitter().light_view_projection().as_slice(), first.as_slice());
}

#[test]
fn test_nearby_lights_fill_slots_nearest_first() {
    let mut core = core();
    core.create_light(
        LightFactory::directional(Vec3::new(1.0, 1.0, 1.0), 1.0),
        TransformComponent::identity().with_forward(Vec3::new(0.0, -1.0, 0.0)),
    );
    for i in 1..=10 {
        core.create_light(
            LightFactory::point(Vec3::new(1.0, 0.5, 0.2), 2.0, 8.0),
            TransformComponent::from_position(Vec3::new(i as f32, 0.0, 0.0)),
        );
    }
    assert_eq!(core.lights().len(), 10);
    spawn_at(&mut core, "lit", "flat", Vec3::new(3.0, 0.0, 0.0));
    let light_buffer = core.materials().shared().light;

    core.tick(1.0 / 60.0).unwrap();
    let draws = batch_draws(&mut core);
    let lights = draws[0].uniform(light_buffer).unwrap();
    let slot = |index: usize| &lights[index * 16..(index + 1) * 16];

    // Slot 0 is the sun, then distance order with ties in registration order
    assert_eq!(slot(0)[11], 1.0);
    let xs: Vec<f32> = (1..8).map(|index| slot(index)[0]).collect();
    assert_eq!(xs, vec![3.0, 2.0, 4.0, 1.0, 5.0, 6.0, 7.0]);
}

#[test]
fn test_disabled_forward_stage_draws_nothing() {
    let mut core = core();
    spawn_at(&mut core, "cube", "flat", Vec3::zeros());
    core.scheduler_mut().set_stage_enabled(FrameStage::Forward, false);

    let stats = core.tick(1.0 / 60.0).unwrap();
    assert!(!stats.ran(FrameStage::Forward));
    assert!(stats.ran(FrameStage::Present));
    assert!(batch_draws(&mut core).is_empty());
}

#[test]
fn test_shutdown_releases_resources_in_rank_order() {
    let mut core = core();
    core.create_material("crowd", &ShaderDescriptor::new("crowd").with_instancing(true))
        .unwrap();
    spawn_at(&mut core, "member", "crowd", Vec3::zeros());
    core.tick(1.0 / 60.0).unwrap();

    core.shutdown().unwrap();
    let device = core.device_as::<HeadlessDevice>().unwrap();
    assert!(device.is_shut_down());
    assert_eq!(device.live_buffer_count(), 0);

    let ranks: Vec<u8> = device.disposals().iter().map(ResourceHandle::shutdown_rank).collect();
    assert!(!ranks.is_empty());
    assert!(ranks.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(matches!(device.disposals().last(), Some(ResourceHandle::Buffer(_))));
}

#[test]
fn test_instances_past_capacity_are_dropped() {
    let mut core = core_with(RenderConfig::default().with_instance_capacity(2));
    core.create_material("crowd", &ShaderDescriptor::new("crowd").with_instancing(true))
        .unwrap();
    for x in [-2.0, 0.0, 2.0] {
        spawn_at(&mut core, "member", "crowd", Vec3::new(x, 0.0, 0.0));
    }

    for _ in 0..2 {
        let stats = core.tick(1.0 / 60.0).unwrap();
        assert_eq!(stats.draw.instances, 2);
        assert_eq!(stats.draw.dropped_instances, 1);

        let draws = batch_draws(&mut core);
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].instance_count, 2);
    }
}

#[test]
fn test_batch_state_is_reused_across_frames() {
    let mut core = core();
    core.create_material("crowd", &ShaderDescriptor::new("crowd").with_instancing(true))
        .unwrap();
    spawn_at(&mut core, "a", "crowd", Vec3::new(-1.0, 0.0, 0.0));
    spawn_at(&mut core, "b", "crowd", Vec3::new(1.0, 0.0, 0.0));
    let key = BatchKey::new("cube", "crowd");

    core.tick(1.0 / 60.0).unwrap();
    let orchestrator = core.scheduler().draw_orchestrator();
    assert_eq!(orchestrator.cached_batches(), 1);
    let buffer = orchestrator
        .batch_state(&key)
        .and_then(|state| state.instance_buffer())
        .unwrap();
    let buffers = headless(&mut core).live_buffer_count();

    core.tick(1.0 / 60.0).unwrap();
    let orchestrator = core.scheduler().draw_orchestrator();
    assert_eq!(orchestrator.cached_batches(), 1);
    assert_eq!(orchestrator.batch_state(&key).and_then(|state| state.instance_buffer()), Some(buffer));
    assert_eq!(headless(&mut core).live_buffer_count(), buffers);

    let draws = batch_draws(&mut core);
    assert_eq!(draws[0].vertex_buffers.get(&1), Some(&buffer));
}

#[test]
fn test_forward_pass_copies_color_for_later_reads() {
    let mut core = core();
    spawn_at(&mut core, "cube", "flat", Vec3::zeros());
    let targets = *core.targets();

    core.tick(1.0 / 60.0).unwrap();
    assert_eq!(headless(&mut core).copies(), &[(targets.color, targets.color_copy)][..]);

    // Logs cover one frame, so the copy is not repeated in the next one
    core.tick(1.0 / 60.0).unwrap();
    assert_eq!(headless(&mut core).copies().len(), 1);
}

#[test]
fn test_culling_uses_the_parent_chain() {
    let mut core = core();
    let anchor = core.create_transform(TransformComponent::from_position(Vec3::new(0.0, 0.0, 200.0)));
    let child = spawn_at(&mut core, "child", "flat", Vec3::new(0.0, 0.0, -200.0));

    // On its own the child sits far past the far plane
    core.tick(1.0 / 60.0).unwrap();
    assert!(!is_visible(&core, child));

    core.set_parent(child, Some(anchor));
    core.tick(1.0 / 60.0).unwrap();
    assert!(is_visible(&core, child));
}

#[test]
fn test_singular_world_matrix_draws_with_identity_normals() {
    let mut core = core();
    let flat = core.spawn("flat", "cube", "flat", false);
    core.set_transform(
        flat,
        &Transform {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::zeros(),
        },
    );
    let transform = core.materials().shared().transform;

    core.tick(1.0 / 60.0).unwrap();
    let draws = batch_draws(&mut core);
    assert_eq!(draws.len(), 1);

    // Block layout: world (0..16), then normal (16..32)
    let block = draws[0].uniform(transform).unwrap();
    assert_eq!(&block[16..32], Mat4::identity().as_slice());
}

#[test]
fn test_shadow_and_forward_passes_wait_for_idle() {
    let mut core = core();
    spawn_at(&mut core, "cube", "flat", Vec3::zeros());

    let before = headless(&mut core).idle_wait_count();
    core.tick(1.0 / 60.0).unwrap();
    assert_eq!(headless(&mut core).idle_wait_count() - before, 2);

    let submissions = headless(&mut core).submissions().to_vec();
    assert_eq!(submissions.first().map(String::as_str), Some("shadow_pass"));
    assert_eq!(submissions.get(1).map(String::as_str), Some("frame_clear"));
    assert_eq!(submissions.last().map(String::as_str), Some("frame_resolve"));

    core.scheduler_mut().set_stage_enabled(FrameStage::Shadow, false);
    let before = headless(&mut core).idle_wait_count();
    core.tick(1.0 / 60.0).unwrap();
    assert_eq!(headless(&mut core).idle_wait_count() - before, 1);
}
