//! Upload of the asset's binary buffers.

use hearth_assets::Asset;
use hearth_assets::ir::Target;
use hearth_render::{BufferDescriptor, BufferId, GpuDevice, align_to_four};

/// Usage flags for one asset buffer, from the targets of the views that
/// reference it. Views without a target are treated as vertex data.
pub fn buffer_usage(asset: &Asset, buffer: usize) -> wgpu::BufferUsages {
    let mut usage = wgpu::BufferUsages::COPY_DST;
    for view in asset.views.iter().filter(|v| v.buffer == buffer) {
        usage |= match view.target {
            Some(Target::ElementArrayBuffer) => wgpu::BufferUsages::INDEX,
            Some(Target::ArrayBuffer) | None => wgpu::BufferUsages::VERTEX,
        };
    }
    usage
}

/// One GPU buffer per asset buffer, sized up to a multiple of four.
pub fn upload(asset: &Asset, device: &mut dyn GpuDevice, label: &str) -> Vec<BufferId> {
    asset
        .buffers
        .iter()
        .enumerate()
        .map(|(index, data)| {
            let usage = buffer_usage(asset, index);
            tracing::trace!(label, index, bytes = data.len(), ?usage, "uploading buffer");
            device.create_buffer_init(
                &BufferDescriptor {
                    label: format!("{label}:buffer{index}"),
                    size: align_to_four(data.len() as u64),
                    usage,
                },
                data,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_assets::ir::BufferView;
    use hearth_render::RecordingDevice;

    fn view(buffer: usize, target: Option<Target>) -> BufferView {
        BufferView {
            buffer,
            offset: 0,
            length: 4,
            stride: None,
            target,
        }
    }

    #[test]
    fn usage_follows_view_targets() {
        let asset = Asset {
            buffers: vec![vec![0; 4], vec![0; 4], vec![0; 4], vec![0; 4]],
            views: vec![
                view(0, Some(Target::ArrayBuffer)),
                view(1, Some(Target::ElementArrayBuffer)),
                view(2, Some(Target::ArrayBuffer)),
                view(2, Some(Target::ElementArrayBuffer)),
                view(3, None),
            ],
            ..Default::default()
        };
        use wgpu::BufferUsages as U;
        assert_eq!(buffer_usage(&asset, 0), U::COPY_DST | U::VERTEX);
        assert_eq!(buffer_usage(&asset, 1), U::COPY_DST | U::INDEX);
        assert_eq!(buffer_usage(&asset, 2), U::COPY_DST | U::VERTEX | U::INDEX);
        assert_eq!(buffer_usage(&asset, 3), U::COPY_DST | U::VERTEX);
    }

    #[test]
    fn unreferenced_buffer_is_copy_only() {
        let asset = Asset {
            buffers: vec![vec![1, 2]],
            ..Default::default()
        };
        assert_eq!(buffer_usage(&asset, 0), wgpu::BufferUsages::COPY_DST);
    }

    #[test]
    fn upload_pads_to_four() {
        let asset = Asset {
            buffers: vec![vec![1, 2, 3, 4, 5, 6]],
            views: vec![view(0, Some(Target::ArrayBuffer))],
            ..Default::default()
        };
        let mut device = RecordingDevice::new();
        let ids = upload(&asset, &mut device, "model");
        let buffer = device.buffer(ids[0]).unwrap();
        assert_eq!(buffer.desc.size, 8);
        assert_eq!(&device.buffer_contents(ids[0]).unwrap()[..6], &[1, 2, 3, 4, 5, 6]);
    }
}
