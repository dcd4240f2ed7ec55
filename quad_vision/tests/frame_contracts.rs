mod common;

use common::synthetic::{gray_from_fn, noisy_color};
use quad_vision::core_modules::edges::edges;
use quad_vision::core_modules::grayscale::grayscale;
use quad_vision::core_modules::threshold::threshold;
use quad_vision::{Bgrx, FramePipeline, PipelineConfig, View};

fn pipeline() -> FramePipeline {
    FramePipeline::new(PipelineConfig::default()).expect("pipeline")
}

fn channels_equal_and_binary(buffer: &quad_vision::PixelBuffer) -> bool {
    buffer.rows().all(|row| {
        row.chunks_exact(4)
            .all(|px| (px[0] == 0 || px[0] == 255) && px[0] == px[1] && px[1] == px[2])
    })
}

#[test]
fn grayscale_is_idempotent_on_noise() {
    for seed in 1..6 {
        let once = grayscale(&noisy_color(37, 23, seed)).expect("grayscale");
        assert_eq!(grayscale(&once).expect("grayscale"), once, "seed {seed}");
    }
}

#[test]
fn threshold_is_binary_on_noise() {
    for seed in 1..6 {
        let gray = grayscale(&noisy_color(29, 31, seed)).expect("grayscale");
        assert!(channels_equal_and_binary(&threshold(&gray).expect("threshold")));
    }
}

#[test]
fn edge_border_is_blank_on_noise() {
    let gray = grayscale(&noisy_color(25, 19, 42)).expect("grayscale");
    let map = edges(&gray).expect("edges");
    assert!(channels_equal_and_binary(&map));
    for x in 0..25 {
        assert_eq!(map.luma(x, 0), Ok(0));
        assert_eq!(map.luma(x, 18), Ok(0));
    }
    for y in 0..19 {
        assert_eq!(map.luma(0, y), Ok(0));
        assert_eq!(map.luma(24, y), Ok(0));
    }
}

#[test]
fn step_image_yields_a_vertical_edge_line() {
    let step = gray_from_fn(20, 12, |x, _| if x < 10 { 0 } else { 255 });
    let result = pipeline().process(Some(&step)).expect("result");
    let map = result.edges();
    for y in 1..11 {
        for x in 1..19 {
            let expected = if x == 9 || x == 10 { 255 } else { 0 };
            assert_eq!(map.luma(x, y), Ok(expected), "pixel ({x}, {y})");
        }
    }
}

#[test]
fn light_background_with_dark_block() {
    let mut frame = gray_from_fn(50, 50, |_, _| 200);
    for y in 20..30 {
        for x in 5..15 {
            frame.set_pixel(x, y, Bgrx::gray(20)).expect("in range");
        }
    }
    let result = pipeline().process(Some(&frame)).expect("result");
    let bw = result.black_and_white();
    assert_eq!(bw.luma(10, 25), Ok(255));
    assert_eq!(bw.luma(40, 40), Ok(0));
}

#[test]
fn missing_frame_is_not_an_error() {
    assert!(pipeline().process(None).is_none());
}

#[test]
fn mutating_the_source_after_processing_changes_nothing() {
    let mut frame = noisy_color(30, 20, 7);
    let result = pipeline().process(Some(&frame)).expect("result");
    let before: Vec<_> = View::ALL.iter().map(|v| result.view(*v).clone()).collect();

    frame.fill(Bgrx::gray(255));

    for (view, snapshot) in View::ALL.iter().zip(before) {
        assert_eq!(result.view(*view), &snapshot, "{}", view.name());
    }
}

#[test]
fn black_and_white_and_edges_use_the_grayscale_view() {
    let frame = noisy_color(33, 21, 3);
    let result = pipeline().process(Some(&frame)).expect("result");
    assert_eq!(result.black_and_white(), &threshold(result.grayscale()).expect("threshold"));
    assert_eq!(result.edges(), &edges(result.grayscale()).expect("edges"));
}
