//! End-to-end tests over the public API, using in-memory fixtures only:
//! images generated with the `image` crate and PDFs produced by the
//! pipeline itself and fed back in as passthrough inputs.

use docfuse::{
    classify, convert_session, DocfuseError, FileCategory, JobConfig, PageSize, RenderErrorKind,
    SessionStore,
};
use image::codecs::gif::GifEncoder;
use image::{DynamicImage, Frame, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use lopdf::Document;
use std::io::Cursor;

fn png_bytes(w: u32, h: u32) -> Vec<u8> {
    let mut out = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([40, 90, 200])))
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .unwrap();
    out
}

fn gif_bytes(frames: usize) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut out);
        for i in 0..frames {
            let shade = 40 + (i as u8) * 30;
            let frame = Frame::new(RgbaImage::from_pixel(8, 8, Rgba([shade, 10, 10, 255])));
            encoder.encode_frame(frame).unwrap();
        }
    }
    out
}

/// Convert one animated GIF at a given page size and return the PDF bytes.
/// Used to manufacture multi-page PDF fixtures through the pipeline itself.
async fn pdf_fixture(pages: usize, page_size: PageSize) -> Vec<u8> {
    let store = SessionStore::new();
    let sid = store.create_session().await;
    let info = store
        .upload(&sid, "frames.gif", gif_bytes(pages))
        .await
        .unwrap();
    let config = JobConfig::builder().page_size(page_size).build().unwrap();
    let output = convert_session(&store, &sid, &[info.id], &config)
        .await
        .unwrap();
    assert_eq!(output.stats.total_pages, pages);
    output.pdf_bytes
}

fn page_widths(pdf_bytes: &[u8]) -> Vec<f32> {
    let doc = Document::load_mem(pdf_bytes).unwrap();
    let pages = doc.get_pages();
    pages
        .values()
        .map(|&id| {
            let page = doc.get_object(id).unwrap().as_dict().unwrap();
            page.get(b"MediaBox").unwrap().as_array().unwrap()[2]
                .as_float()
                .unwrap()
        })
        .collect()
}

#[tokio::test]
async fn single_image_becomes_one_page_at_the_configured_size() {
    let store = SessionStore::new();
    let sid = store.create_session().await;
    let info = store.upload(&sid, "photo.png", png_bytes(64, 48)).await.unwrap();

    let config = JobConfig::builder()
        .page_size(PageSize::Letter)
        .build()
        .unwrap();
    let output = convert_session(&store, &sid, &[info.id], &config)
        .await
        .unwrap();

    assert_eq!(output.stats.total_pages, 1);
    assert_eq!(page_widths(&output.pdf_bytes), vec![612.0]);
}

#[tokio::test]
async fn merge_preserves_request_order_across_mixed_page_counts() {
    // Three PDF inputs of 2, 1, and 3 pages, each built at a distinct
    // page width so the merged page sequence reveals source order.
    let a = pdf_fixture(2, PageSize::Custom { width_pt: 500.0, height_pt: 700.0 }).await;
    let b = pdf_fixture(1, PageSize::Letter).await;
    let c = pdf_fixture(3, PageSize::Custom { width_pt: 700.0, height_pt: 900.0 }).await;

    let store = SessionStore::new();
    let sid = store.create_session().await;
    let ia = store.upload(&sid, "a.pdf", a).await.unwrap();
    let ib = store.upload(&sid, "b.pdf", b).await.unwrap();
    let ic = store.upload(&sid, "c.pdf", c).await.unwrap();

    let output = convert_session(
        &store,
        &sid,
        &[ia.id, ib.id, ic.id],
        &JobConfig::default(),
    )
    .await
    .unwrap();

    assert_eq!(output.stats.total_pages, 6);
    assert_eq!(
        page_widths(&output.pdf_bytes),
        vec![500.0, 500.0, 612.0, 700.0, 700.0, 700.0]
    );
}

#[tokio::test]
async fn reordering_the_session_changes_output_page_order() {
    let a = pdf_fixture(1, PageSize::Custom { width_pt: 500.0, height_pt: 700.0 }).await;
    let b = pdf_fixture(1, PageSize::Letter).await;

    let store = SessionStore::new();
    let sid = store.create_session().await;
    let ia = store.upload(&sid, "a.pdf", a).await.unwrap();
    let ib = store.upload(&sid, "b.pdf", b).await.unwrap();

    store
        .reorder(&sid, &[ib.id.clone(), ia.id.clone()])
        .await
        .unwrap();
    let order: Vec<String> = store
        .list(&sid)
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.id)
        .collect();

    let output = convert_session(&store, &sid, &order, &JobConfig::default())
        .await
        .unwrap();
    assert_eq!(page_widths(&output.pdf_bytes), vec![612.0, 500.0]);
}

#[tokio::test]
async fn one_corrupt_upload_is_isolated_from_the_rest() {
    let store = SessionStore::new();
    let sid = store.create_session().await;
    let good1 = store.upload(&sid, "one.png", png_bytes(10, 10)).await.unwrap();
    let bad = store
        .upload(&sid, "broken.png", b"not a picture".to_vec())
        .await
        .unwrap();
    let good2 = store.upload(&sid, "two.png", png_bytes(10, 10)).await.unwrap();

    let output = convert_session(
        &store,
        &sid,
        &[good1.id, bad.id.clone(), good2.id],
        &JobConfig::default(),
    )
    .await
    .unwrap();

    assert_eq!(output.stats.requested_files, 3);
    assert_eq!(output.stats.converted_files, 2);
    assert_eq!(output.stats.failed_files, 1);
    assert_eq!(output.stats.total_pages, 2);

    let failed = &output.results[1];
    assert_eq!(failed.file_id, bad.id);
    assert_eq!(
        failed.error.as_ref().unwrap().kind(),
        RenderErrorKind::CorruptInput
    );
}

#[tokio::test]
async fn unsupported_upload_is_skipped_and_the_rest_still_merge() {
    let store = SessionStore::new();
    let sid = store.create_session().await;
    let good1 = store.upload(&sid, "one.png", png_bytes(10, 10)).await.unwrap();
    let odd = store
        .upload(&sid, "notes.txt", b"just some plain text".to_vec())
        .await
        .unwrap();
    let good2 = store.upload(&sid, "two.png", png_bytes(10, 10)).await.unwrap();

    let output = convert_session(
        &store,
        &sid,
        &[good1.id, odd.id.clone(), good2.id],
        &JobConfig::default(),
    )
    .await
    .unwrap();

    assert_eq!(output.stats.requested_files, 3);
    assert_eq!(output.stats.converted_files, 2);
    assert_eq!(output.stats.failed_files, 1);
    assert_eq!(output.stats.total_pages, 2);

    let skipped = &output.results[1];
    assert_eq!(skipped.file_id, odd.id);
    assert_eq!(skipped.category, FileCategory::Unsupported);
    assert_eq!(
        skipped.error.as_ref().unwrap().kind(),
        RenderErrorKind::UnsupportedFormat
    );
    assert!(skipped.error.as_ref().unwrap().to_string().contains("notes.txt"));
}

#[tokio::test]
async fn job_fails_only_when_every_file_fails() {
    let store = SessionStore::new();
    let sid = store.create_session().await;
    let x = store.upload(&sid, "x.png", b"junk".to_vec()).await.unwrap();
    let y = store.upload(&sid, "y.pdf", b"junk".to_vec()).await.unwrap();

    let err = convert_session(&store, &sid, &[x.id, y.id], &JobConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DocfuseError::AllConversionsFailed { total: 2, .. }
    ));
}

#[tokio::test]
async fn empty_selection_is_rejected() {
    let store = SessionStore::new();
    let sid = store.create_session().await;
    let err = convert_session(&store, &sid, &[], &JobConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DocfuseError::EmptyInput));
}

#[tokio::test]
async fn unknown_session_is_fatal() {
    let store = SessionStore::new();
    let err = convert_session(&store, "ghost", &["id".to_string()], &JobConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DocfuseError::SessionNotFound { .. }));
}

#[tokio::test]
async fn animated_gif_contributes_one_page_per_frame() {
    let store = SessionStore::new();
    let sid = store.create_session().await;
    let info = store.upload(&sid, "anim.gif", gif_bytes(3)).await.unwrap();

    let output = convert_session(&store, &sid, &[info.id], &JobConfig::default())
        .await
        .unwrap();
    assert_eq!(output.stats.total_pages, 3);
}

#[tokio::test]
async fn failed_reorder_leaves_conversion_order_untouched() {
    let store = SessionStore::new();
    let sid = store.create_session().await;
    let a = store.upload(&sid, "a.png", png_bytes(4, 4)).await.unwrap();
    let b = store.upload(&sid, "b.png", png_bytes(4, 4)).await.unwrap();

    let err = store
        .reorder(&sid, &[a.id.clone(), "ghost".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, DocfuseError::InvalidOrder { .. }));

    let order: Vec<String> = store
        .list(&sid)
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.id)
        .collect();
    assert_eq!(order, vec![a.id, b.id]);
}

#[test]
fn classification_is_deterministic_and_extension_first() {
    let png = png_bytes(2, 2);
    for _ in 0..3 {
        assert_eq!(classify("photo.png", &png), FileCategory::Image);
        // Extension wins even when the bytes disagree.
        assert_eq!(classify("sheet.xlsx", &png), FileCategory::Spreadsheet);
        // No extension falls back to content sniffing.
        assert_eq!(classify("upload-1", &png), FileCategory::Image);
        assert_eq!(classify("mystery.bin", b"plain text"), FileCategory::Unsupported);
    }
}

#[tokio::test]
async fn remove_then_convert_skips_the_removed_file() {
    let store = SessionStore::new();
    let sid = store.create_session().await;
    let keep = store.upload(&sid, "keep.png", png_bytes(4, 4)).await.unwrap();
    let drop = store.upload(&sid, "drop.png", png_bytes(4, 4)).await.unwrap();

    store.remove(&sid, &drop.id).await.unwrap();

    let order: Vec<String> = store
        .list(&sid)
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.id)
        .collect();
    assert_eq!(order, vec![keep.id]);

    let output = convert_session(&store, &sid, &order, &JobConfig::default())
        .await
        .unwrap();
    assert_eq!(output.stats.total_pages, 1);
}
